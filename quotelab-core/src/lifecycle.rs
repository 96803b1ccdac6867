//! Order lifecycle: reconcile the live orders at the simulator with this tick's desired set.
//!
//! Per tick, in order:
//! 1. settle submissions that timed out earlier and have since been acknowledged
//! 2. cancel phase (policy dependent, only cancellable orders are touched)
//! 3. submit phase (guards, slot check, submit with the configured time-in-force)
//! 4. wait for the acknowledgement of the last submitted tag, or of the oldest
//!    outstanding one when nothing was submitted, bounded by `ack_timeout_ns`
//!
//! Guard and venue rejections, no-op cancels and ack timeouts are reported in the
//! [`ReconcileReport`]. Only `max_consecutive_ack_timeouts` ticks in a row ending in an
//! ack timeout, or an unexpected simulator error, abort the session.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{DesiredOrder, DesiredOrders, OrderStatus, OrderTag, Side};
use crate::guards::{GuardRejection, OrderGuards};
use crate::params::{GuardParams, LifecycleParams, ReconcilePolicy};
use crate::simulator::{CancelOutcome, MarketSimulator, OrderAck, RejectReason, SimError};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("acknowledgement for {tag} still outstanding after {ticks} consecutive ticks")]
    AckStalled { tag: OrderTag, ticks: u32 },

    #[error("simulator error: {0}")]
    Simulator(#[from] SimError),
}

/// Why a desired order was not placed this tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectionReason {
    Guard(GuardRejection),
    /// The side still holds an order that could not be cancelled.
    SlotBusy,
    /// Refused by the venue on arrival.
    Venue(RejectReason),
    /// Refused by the simulator before reaching the book (e.g. sub-lot quantity).
    Invalid(String),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::Guard(g) => write!(f, "guard: {g}"),
            RejectionReason::SlotBusy => write!(f, "slot busy"),
            RejectionReason::Venue(r) => write!(f, "venue: {r}"),
            RejectionReason::Invalid(msg) => write!(f, "invalid: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub tag: OrderTag,
    pub reason: RejectionReason,
}

/// Result of the ack wait at the end of a reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AckStatus {
    /// Nothing was submitted this tick.
    NotAwaited,
    Received { tag: OrderTag, ack: OrderAck },
    TimedOut { tag: OrderTag },
}

/// What one reconcile did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub cancelled: Vec<OrderTag>,
    pub noop_cancels: Vec<OrderTag>,
    pub submitted: Vec<DesiredOrder>,
    pub rejections: Vec<Rejection>,
    pub ack: AckStatus,
}

impl ReconcileReport {
    fn empty() -> Self {
        Self {
            cancelled: Vec::new(),
            noop_cancels: Vec::new(),
            submitted: Vec::new(),
            rejections: Vec::new(),
            ack: AckStatus::NotAwaited,
        }
    }

    pub fn timed_out(&self) -> bool {
        matches!(self.ack, AckStatus::TimedOut { .. })
    }
}

fn slot_index(side: Side) -> usize {
    match side {
        Side::Buy => 0,
        Side::Sell => 1,
    }
}

#[derive(Debug, Clone)]
pub struct OrderLifecycleManager {
    params: LifecycleParams,
    guards: OrderGuards,
    /// Last desired order submitted per side; compared against under `Diff`.
    last_submitted: [Option<DesiredOrder>; 2],
    /// Tags whose acknowledgement has not been seen yet.
    pending_acks: Vec<OrderTag>,
    stalled_ticks: u32,
}

impl OrderLifecycleManager {
    pub fn new(params: &LifecycleParams, guards: &GuardParams) -> Self {
        Self::with_guards(params, OrderGuards::new(guards))
    }

    pub fn with_guards(params: &LifecycleParams, guards: OrderGuards) -> Self {
        Self {
            params: params.clone(),
            guards,
            last_submitted: [None; 2],
            pending_acks: Vec::new(),
            stalled_ticks: 0,
        }
    }

    pub fn pending_acks(&self) -> &[OrderTag] {
        &self.pending_acks
    }

    /// Consecutive ticks that ended in an ack timeout.
    pub fn stalled_ticks(&self) -> u32 {
        self.stalled_ticks
    }

    pub fn reconcile<S>(
        &mut self,
        desired: &DesiredOrders,
        sim: &mut S,
    ) -> Result<ReconcileReport, LifecycleError>
    where
        S: MarketSimulator + ?Sized,
    {
        let mut report = ReconcileReport::empty();
        let settled = self.settle_pending(sim, &mut report)?;
        self.cancel_phase(desired, sim, &mut report)?;
        let last_tag = self.submit_phase(desired, sim, &mut report)?;

        // Nothing new went out: keep waiting on the oldest outstanding submission.
        if let Some(tag) = last_tag.or_else(|| self.pending_acks.first().copied()) {
            let ack = self.await_ack(tag, sim, &mut report)?;
            report.ack = ack;
        }

        match report.ack {
            AckStatus::TimedOut { tag } => {
                self.stalled_ticks += 1;
                let limit = self.params.max_consecutive_ack_timeouts;
                if limit > 0 && self.stalled_ticks >= limit {
                    return Err(LifecycleError::AckStalled {
                        tag,
                        ticks: self.stalled_ticks,
                    });
                }
            }
            AckStatus::Received { .. } => self.stalled_ticks = 0,
            AckStatus::NotAwaited if settled => self.stalled_ticks = 0,
            AckStatus::NotAwaited => {}
        }
        Ok(report)
    }

    /// Collect late acknowledgements for pending tags whose order has left `PendingNew`.
    ///
    /// A late venue rejection is reported in this tick's `report`. Returns whether any
    /// pending tag was resolved.
    fn settle_pending<S: MarketSimulator + ?Sized>(
        &mut self,
        sim: &mut S,
        report: &mut ReconcileReport,
    ) -> Result<bool, LifecycleError> {
        let live = sim.live_orders();
        for side in [Side::Buy, Side::Sell] {
            if live.get(side).is_none() {
                self.last_submitted[slot_index(side)] = None;
            }
        }
        if self.pending_acks.is_empty() {
            return Ok(false);
        }

        let (resolved, still_pending): (Vec<OrderTag>, Vec<OrderTag>) =
            self.pending_acks.iter().partition(|tag| {
                !live
                    .get(tag.side())
                    .is_some_and(|o| o.status == OrderStatus::PendingNew)
            });
        self.pending_acks = still_pending;

        for tag in &resolved {
            match sim.await_ack(*tag, 0) {
                Ok(OrderAck::Rejected(reason)) => {
                    debug!(%tag, %reason, "late rejection observed");
                    self.last_submitted[slot_index(tag.side())] = None;
                    self.reject(report, *tag, RejectionReason::Venue(reason));
                }
                Ok(ack) => debug!(%tag, ?ack, "late acknowledgement observed"),
                Err(SimError::AckTimeout { .. } | SimError::NoPendingSubmission(_)) => {
                    debug!(%tag, "pending order resolved without an acknowledgement");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(!resolved.is_empty())
    }

    /// A live order is kept only under `Diff` when the same terms are still desired.
    fn keeps(&self, side: Side, desired: &DesiredOrders) -> bool {
        match self.params.policy {
            ReconcilePolicy::CancelAll => false,
            ReconcilePolicy::Diff => desired
                .get(side)
                .zip(self.last_submitted[slot_index(side)].as_ref())
                .is_some_and(|(want, sent)| want.same_terms(sent)),
        }
    }

    fn cancel_phase<S: MarketSimulator + ?Sized>(
        &mut self,
        desired: &DesiredOrders,
        sim: &mut S,
        report: &mut ReconcileReport,
    ) -> Result<(), LifecycleError> {
        let live = sim.live_orders();
        for order in live.iter() {
            if self.keeps(order.side, desired) {
                continue;
            }
            if !order.cancellable {
                debug!(tag = %order.tag, "cancel skipped, order not cancellable");
                report.noop_cancels.push(order.tag);
                continue;
            }
            match sim.cancel(order.tag)? {
                CancelOutcome::Cancelled => {
                    debug!(tag = %order.tag, price = order.price, "cancelled");
                    self.last_submitted[slot_index(order.side)] = None;
                    report.cancelled.push(order.tag);
                }
                outcome => {
                    debug!(tag = %order.tag, ?outcome, "cancel was a no-op");
                    report.noop_cancels.push(order.tag);
                }
            }
        }
        Ok(())
    }

    fn submit_phase<S: MarketSimulator + ?Sized>(
        &mut self,
        desired: &DesiredOrders,
        sim: &mut S,
        report: &mut ReconcileReport,
    ) -> Result<Option<OrderTag>, LifecycleError> {
        let live = sim.live_orders();
        let book = sim.current_tick();
        let now = sim.now();
        let mut last_tag = None;

        for order in desired.iter() {
            if live.get(order.side).is_some() {
                if !self.keeps(order.side, desired) {
                    self.reject(report, order.tag, RejectionReason::SlotBusy);
                }
                continue;
            }
            if let Err(reason) = self.guards.admit(order, &book, now) {
                self.reject(report, order.tag, RejectionReason::Guard(reason));
                continue;
            }
            match sim.submit(order, self.params.time_in_force) {
                Ok(()) => {
                    debug!(
                        tag = %order.tag,
                        side = %order.side,
                        price = order.limit_price,
                        qty = order.quantity,
                        "submitted"
                    );
                    self.last_submitted[slot_index(order.side)] = Some(*order);
                    report.submitted.push(*order);
                    last_tag = Some(order.tag);
                }
                Err(SimError::InvalidOrder { reason, .. }) => {
                    self.reject(report, order.tag, RejectionReason::Invalid(reason));
                }
                Err(SimError::DuplicateOrder(tag)) => {
                    self.reject(report, tag, RejectionReason::SlotBusy);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(last_tag)
    }

    fn await_ack<S: MarketSimulator + ?Sized>(
        &mut self,
        tag: OrderTag,
        sim: &mut S,
        report: &mut ReconcileReport,
    ) -> Result<AckStatus, LifecycleError> {
        match sim.await_ack(tag, self.params.ack_timeout_ns) {
            Ok(ack) => {
                self.pending_acks.retain(|t| *t != tag);
                if let OrderAck::Rejected(reason) = ack {
                    self.last_submitted[slot_index(tag.side())] = None;
                    self.reject(report, tag, RejectionReason::Venue(reason));
                }
                Ok(AckStatus::Received { tag, ack })
            }
            Err(SimError::AckTimeout { timeout_ns, .. }) => {
                warn!(%tag, timeout_ns, "acknowledgement timed out");
                if !self.pending_acks.contains(&tag) {
                    self.pending_acks.push(tag);
                }
                Ok(AckStatus::TimedOut { tag })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn reject(&self, report: &mut ReconcileReport, tag: OrderTag, reason: RejectionReason) {
        debug!(%tag, %reason, "order rejected");
        report.rejections.push(Rejection { tag, reason });
    }
}
