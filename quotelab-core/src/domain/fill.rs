use serde::{Deserialize, Serialize};

use super::ids::OrderTag;
use super::order::Side;

/// A simulated execution against one of the strategy's orders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub tag: OrderTag,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    /// Fee charged in quote currency (positive = paid).
    pub fee: f64,
    pub timestamp_ns: i64,
    /// True when the order rested and was hit (maker fee applied).
    pub maker: bool,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}

/// Account state reported by the simulator after each step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub timestamp_ns: i64,
    /// Mark-to-market PnL: cash + position * mid.
    pub pnl: f64,
    pub position: f64,
    pub cash: f64,
    pub fees_paid: f64,
    pub fill_count: u64,
    pub traded_quantity: f64,
    pub mid: f64,
}
