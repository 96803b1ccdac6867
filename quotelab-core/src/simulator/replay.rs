//! Deterministic tick replay venue.
//!
//! A deliberately small model, enough to exercise the engine end to end:
//! - the clock starts at the first tick and moves by the loop quantum; every tick
//!   with `timestamp <= clock` is applied in order
//! - submissions are acknowledged `order_latency_ns` after they are sent; a post-only
//!   order that would cross at that moment is rejected, a GTC order that crosses
//!   executes at the touch as taker
//! - working orders fill when the book trades through their price, at the order price,
//!   capped by the tick's traded volume, paying the maker fee
//! - cancels take effect immediately
//!
//! There is no queue position and no depth beyond the top of book.

use tracing::debug;

use crate::domain::{
    DesiredOrder, Fill, Instrument, LiveOrder, LiveOrders, OrderStatus, OrderTag, Side,
    SimSnapshot, Tick, TimeInForce,
};
use crate::params::SimParams;

use super::{CancelOutcome, MarketSimulator, OrderAck, RejectReason, SimError};

const QTY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
struct PendingSubmit {
    tif: TimeInForce,
    due_ns: i64,
}

fn slot_index(side: Side) -> usize {
    match side {
        Side::Buy => 0,
        Side::Sell => 1,
    }
}

fn valid_price(p: f64) -> bool {
    p.is_finite() && p > 0.0
}

#[derive(Debug, Clone)]
pub struct ReplaySimulator {
    ticks: Vec<Tick>,
    cursor: usize,
    clock: Option<i64>,
    book: Option<Tick>,
    mark_price: f64,
    step_volume: f64,
    instrument: Instrument,
    maker_fee: f64,
    taker_fee: f64,
    order_latency_ns: i64,
    orders: LiveOrders,
    pending: [Option<PendingSubmit>; 2],
    acks: [Option<OrderAck>; 2],
    cash: f64,
    position: f64,
    fees_paid: f64,
    traded_quantity: f64,
    fills: Vec<Fill>,
}

impl ReplaySimulator {
    pub fn new(ticks: Vec<Tick>, params: &SimParams) -> Self {
        Self {
            ticks,
            cursor: 0,
            clock: None,
            book: None,
            mark_price: f64::NAN,
            step_volume: 0.0,
            instrument: Instrument::new(params.tick_size, params.lot_size),
            maker_fee: params.maker_fee,
            taker_fee: params.taker_fee,
            order_latency_ns: params.order_latency_ns.max(0),
            orders: LiveOrders::default(),
            pending: [None; 2],
            acks: [None; 2],
            cash: 0.0,
            position: 0.0,
            fees_paid: 0.0,
            traded_quantity: 0.0,
            fills: Vec::new(),
        }
    }

    /// Every fill so far, in execution order.
    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn remaining_ticks(&self) -> usize {
        self.ticks.len() - self.cursor
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    /// Process every event up to and including `target_ns`, in time order.
    fn run_until(&mut self, target_ns: i64) {
        while let Some(&tick) = self.ticks.get(self.cursor) {
            if tick.timestamp_ns > target_ns {
                break;
            }
            self.process_acks_through(tick.timestamp_ns);
            self.apply_tick(tick);
            self.cursor += 1;
        }
        self.process_acks_through(target_ns);
        let now = self.clock.unwrap_or(target_ns);
        self.clock = Some(now.max(target_ns));
    }

    fn process_acks_through(&mut self, t_ns: i64) {
        let mut due: Vec<(i64, Side)> = [Side::Buy, Side::Sell]
            .into_iter()
            .filter_map(|side| {
                self.pending[slot_index(side)]
                    .filter(|p| p.due_ns <= t_ns)
                    .map(|p| (p.due_ns, side))
            })
            .collect();
        due.sort_by_key(|&(t, side)| (t, slot_index(side)));
        for (_, side) in due {
            self.process_ack(side);
        }
    }

    fn process_ack(&mut self, side: Side) {
        let i = slot_index(side);
        let Some(pending) = self.pending[i].take() else {
            return;
        };
        let Some(order) = self.orders.get(side).copied() else {
            return;
        };

        let ack = match (self.touch_if_crossing(side, order.price), pending.tif) {
            (Some(_), TimeInForce::PostOnly) => {
                *self.orders.slot_mut(side) = None;
                OrderAck::Rejected(RejectReason::WouldCross)
            }
            (Some(touch), TimeInForce::Gtc) => {
                let qty = order.remaining_quantity();
                self.execute(order.tag, side, touch, qty, self.taker_fee, pending.due_ns, false);
                *self.orders.slot_mut(side) = None;
                OrderAck::FilledOnArrival
            }
            (None, _) => {
                if let Some(live) = self.orders.slot_mut(side).as_mut() {
                    live.status = OrderStatus::Working;
                    live.cancellable = true;
                }
                OrderAck::Accepted
            }
        };
        debug!(tag = %order.tag, price = order.price, ?ack, "order acknowledged");
        self.acks[i] = Some(ack);
    }

    /// Opposite touch price when an order at `price` would execute immediately.
    fn touch_if_crossing(&self, side: Side, price: f64) -> Option<f64> {
        let book = self.book?;
        match side {
            Side::Buy if valid_price(book.best_ask) && price >= book.best_ask => {
                Some(book.best_ask)
            }
            Side::Sell if valid_price(book.best_bid) && price <= book.best_bid => {
                Some(book.best_bid)
            }
            _ => None,
        }
    }

    fn apply_tick(&mut self, tick: Tick) {
        self.book = Some(tick);
        if let Some(mid) = tick.mid() {
            self.mark_price = mid;
        }
        let volume = if tick.traded_volume.is_finite() {
            tick.traded_volume.max(0.0)
        } else {
            0.0
        };
        self.step_volume += volume;

        for side in [Side::Buy, Side::Sell] {
            let Some(order) = self.orders.get(side).copied() else {
                continue;
            };
            if order.status != OrderStatus::Working {
                continue;
            }
            let traded_through = match side {
                Side::Buy => valid_price(tick.best_ask) && tick.best_ask <= order.price,
                Side::Sell => valid_price(tick.best_bid) && tick.best_bid >= order.price,
            };
            if !traded_through {
                continue;
            }
            let qty = order.remaining_quantity().min(volume);
            if qty <= QTY_EPSILON {
                continue;
            }
            self.execute(order.tag, side, order.price, qty, self.maker_fee, tick.timestamp_ns, true);

            let slot = self.orders.slot_mut(side);
            let done = match slot.as_mut() {
                Some(live) => {
                    live.filled_quantity += qty;
                    live.remaining_quantity() <= QTY_EPSILON
                }
                None => false,
            };
            if done {
                *slot = None;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn execute(
        &mut self,
        tag: OrderTag,
        side: Side,
        price: f64,
        quantity: f64,
        fee_rate: f64,
        timestamp_ns: i64,
        maker: bool,
    ) {
        let notional = price * quantity;
        let fee = notional * fee_rate;
        self.cash -= side.sign() * notional + fee;
        self.position += side.sign() * quantity;
        self.fees_paid += fee;
        self.traded_quantity += quantity;
        if !self.mark_price.is_finite() {
            self.mark_price = price;
        }
        debug!(%tag, %side, price, quantity, fee, maker, "fill");
        self.fills.push(Fill {
            tag,
            side,
            price,
            quantity,
            fee,
            timestamp_ns,
            maker,
        });
    }
}

impl MarketSimulator for ReplaySimulator {
    fn advance(&mut self, quantum_ns: i64) -> bool {
        if self.cursor >= self.ticks.len() {
            return false;
        }
        self.step_volume = 0.0;
        let target = match self.clock {
            None => self.ticks[0].timestamp_ns,
            Some(now) => now.saturating_add(quantum_ns.max(1)),
        };
        self.run_until(target);
        true
    }

    fn now(&self) -> i64 {
        self.clock
            .or_else(|| self.ticks.first().map(|t| t.timestamp_ns))
            .unwrap_or(0)
    }

    fn best_bid(&self) -> f64 {
        self.book.map_or(f64::NAN, |b| b.best_bid)
    }

    fn best_ask(&self) -> f64 {
        self.book.map_or(f64::NAN, |b| b.best_ask)
    }

    fn traded_volume(&self) -> f64 {
        self.step_volume
    }

    fn live_orders(&self) -> LiveOrders {
        self.orders
    }

    fn cancel(&mut self, tag: OrderTag) -> Result<CancelOutcome, SimError> {
        let side = tag.side();
        let outcome = match self.orders.get(side) {
            None => CancelOutcome::NotFound,
            Some(order) if !order.cancellable => CancelOutcome::NotCancellable,
            Some(_) => CancelOutcome::Cancelled,
        };
        if outcome == CancelOutcome::Cancelled {
            *self.orders.slot_mut(side) = None;
            debug!(%tag, "order cancelled");
        }
        Ok(outcome)
    }

    fn submit(&mut self, order: &DesiredOrder, tif: TimeInForce) -> Result<(), SimError> {
        let tag = order.tag;
        let side = order.side;
        if tag.side() != side {
            return Err(SimError::InvalidOrder {
                tag,
                reason: format!("tag {tag} does not match side {side}"),
            });
        }
        if self.orders.get(side).is_some() {
            return Err(SimError::DuplicateOrder(tag));
        }
        if !valid_price(order.limit_price) {
            return Err(SimError::InvalidOrder {
                tag,
                reason: format!("limit price {} is not positive", order.limit_price),
            });
        }
        let quantity = self
            .instrument
            .round_quantity(order.quantity)
            .map_err(|e| SimError::InvalidOrder {
                tag,
                reason: e.to_string(),
            })?;
        let price = self.instrument.round_price(order.limit_price, side);
        if !valid_price(price) {
            return Err(SimError::InvalidOrder {
                tag,
                reason: format!("limit price {} rounds to zero", order.limit_price),
            });
        }

        *self.orders.slot_mut(side) = Some(LiveOrder {
            tag,
            side,
            price,
            quantity,
            filled_quantity: 0.0,
            status: OrderStatus::PendingNew,
            cancellable: false,
        });
        let i = slot_index(side);
        self.pending[i] = Some(PendingSubmit {
            tif,
            due_ns: self.now().saturating_add(self.order_latency_ns),
        });
        self.acks[i] = None;
        Ok(())
    }

    fn await_ack(&mut self, tag: OrderTag, timeout_ns: i64) -> Result<OrderAck, SimError> {
        let i = slot_index(tag.side());
        if let Some(ack) = self.acks[i].take() {
            return Ok(ack);
        }
        let Some(pending) = self.pending[i] else {
            return Err(SimError::NoPendingSubmission(tag));
        };
        let now = self.now();
        let deadline = now.saturating_add(timeout_ns.max(0));
        if pending.due_ns > deadline {
            self.run_until(deadline);
            return Err(SimError::AckTimeout { tag, timeout_ns });
        }
        self.run_until(pending.due_ns.max(now));
        self.acks[i].take().ok_or(SimError::NoPendingSubmission(tag))
    }

    fn snapshot(&self) -> SimSnapshot {
        let mark = if self.position == 0.0 || !self.mark_price.is_finite() {
            0.0
        } else {
            self.position * self.mark_price
        };
        SimSnapshot {
            timestamp_ns: self.now(),
            pnl: self.cash + mark,
            position: self.position,
            cash: self.cash,
            fees_paid: self.fees_paid,
            fill_count: self.fills.len() as u64,
            traded_quantity: self.traded_quantity,
            mid: self.mark_price,
        }
    }
}
