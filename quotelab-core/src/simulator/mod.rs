//! The exchange seam: everything the engine needs from a simulated venue.
//!
//! The engine never owns order state. It reads the live orders, issues
//! cancel/submit requests and waits for acknowledgements through
//! [`MarketSimulator`]. Fill generation, fees and latency belong to the
//! implementation.

pub mod replay;

pub use replay::ReplaySimulator;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::{DesiredOrder, LiveOrders, OrderTag, SimSnapshot, Tick, TimeInForce};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("order {0} is already live")]
    DuplicateOrder(OrderTag),

    #[error("order {tag} is invalid: {reason}")]
    InvalidOrder { tag: OrderTag, reason: String },

    #[error("no acknowledgement for order {tag} within {timeout_ns} ns")]
    AckTimeout { tag: OrderTag, timeout_ns: i64 },

    #[error("order {0} has no submission awaiting acknowledgement")]
    NoPendingSubmission(OrderTag),
}

/// Result of a cancel request. Only `Cancelled` changes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelOutcome {
    Cancelled,
    NotCancellable,
    NotFound,
}

/// Why the venue refused an order on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Post-only order would have executed against the opposite side.
    WouldCross,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::WouldCross => write!(f, "would cross the spread"),
        }
    }
}

/// Acknowledgement of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderAck {
    /// Resting in the book.
    Accepted,
    /// Executed in full on arrival (non post-only orders only).
    FilledOnArrival,
    Rejected(RejectReason),
}

/// A simulated venue driven one step at a time.
pub trait MarketSimulator {
    /// Move the clock forward by `quantum_ns`. Returns `false` once the data is exhausted.
    fn advance(&mut self, quantum_ns: i64) -> bool;

    /// Current simulated time in nanoseconds.
    fn now(&self) -> i64;

    fn best_bid(&self) -> f64;

    fn best_ask(&self) -> f64;

    /// Volume traded since the previous `advance`.
    fn traded_volume(&self) -> f64;

    fn live_orders(&self) -> LiveOrders;

    fn cancel(&mut self, tag: OrderTag) -> Result<CancelOutcome, SimError>;

    fn submit(&mut self, order: &DesiredOrder, tif: TimeInForce) -> Result<(), SimError>;

    /// Wait for the acknowledgement of `tag`'s latest submission, at most `timeout_ns`
    /// of simulated time.
    fn await_ack(&mut self, tag: OrderTag, timeout_ns: i64) -> Result<OrderAck, SimError>;

    fn snapshot(&self) -> SimSnapshot;

    fn current_tick(&self) -> Tick {
        Tick::new(
            self.now(),
            self.best_bid(),
            self.best_ask(),
            self.traded_volume(),
        )
    }
}
