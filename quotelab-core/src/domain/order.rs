//! Order types: desired orders from the planner and live orders held by the simulator.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::OrderTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "Buy"),
            Side::Sell => write!(f, "Sell"),
        }
    }
}

/// Time-in-force for limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    /// Post-only (GTX): rejected instead of crossing the spread.
    #[default]
    PostOnly,
    /// Good-till-cancel: a crossing order executes immediately as taker.
    Gtc,
}

/// An order the strategy wants resting this tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DesiredOrder {
    pub tag: OrderTag,
    pub side: Side,
    /// Raw limit price. Tick rounding is the simulator's job.
    pub limit_price: f64,
    pub quantity: f64,
}

impl DesiredOrder {
    pub fn new(side: Side, limit_price: f64, quantity: f64) -> Self {
        Self {
            tag: OrderTag::for_side(side),
            side,
            limit_price,
            quantity,
        }
    }

    /// Same side, price and quantity within a relative tolerance.
    pub fn same_terms(&self, other: &DesiredOrder) -> bool {
        const REL_TOL: f64 = 1e-9;
        let close = |a: f64, b: f64| (a - b).abs() <= REL_TOL * a.abs().max(b.abs()).max(1.0);
        self.side == other.side
            && close(self.limit_price, other.limit_price)
            && close(self.quantity, other.quantity)
    }
}

/// The desired order set for one tick: at most one order per side.
///
/// Recomputed fresh every tick; never mutated in place by the lifecycle manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredOrders {
    pub buy: Option<DesiredOrder>,
    pub sell: Option<DesiredOrder>,
}

impl DesiredOrders {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn single(order: DesiredOrder) -> Self {
        let mut set = Self::default();
        set.insert(order);
        set
    }

    /// Insert an order into its side's slot, replacing whatever was there.
    pub fn insert(&mut self, order: DesiredOrder) {
        match order.side {
            Side::Buy => self.buy = Some(order),
            Side::Sell => self.sell = Some(order),
        }
    }

    pub fn get(&self, side: Side) -> Option<&DesiredOrder> {
        match side {
            Side::Buy => self.buy.as_ref(),
            Side::Sell => self.sell.as_ref(),
        }
    }

    /// Orders in submission order: buy first, then sell.
    pub fn iter(&self) -> impl Iterator<Item = &DesiredOrder> {
        self.buy.iter().chain(self.sell.iter())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.buy.is_none() && self.sell.is_none()
    }
}

/// Lifecycle state of an order resting at the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Submitted, acknowledgement not yet received.
    PendingNew,
    /// Acknowledged and resting in the book.
    Working,
}

/// Simulator-owned view of a resting order. The engine only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveOrder {
    pub tag: OrderTag,
    pub side: Side,
    /// Price after tick rounding.
    pub price: f64,
    pub quantity: f64,
    pub filled_quantity: f64,
    pub status: OrderStatus,
    pub cancellable: bool,
}

impl LiveOrder {
    pub fn remaining_quantity(&self) -> f64 {
        self.quantity - self.filled_quantity
    }
}

/// Fixed two-slot container of live orders, addressed by side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveOrders {
    pub buy: Option<LiveOrder>,
    pub sell: Option<LiveOrder>,
}

impl LiveOrders {
    pub fn get(&self, side: Side) -> Option<&LiveOrder> {
        match side {
            Side::Buy => self.buy.as_ref(),
            Side::Sell => self.sell.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, side: Side) -> &mut Option<LiveOrder> {
        match side {
            Side::Buy => &mut self.buy,
            Side::Sell => &mut self.sell,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &LiveOrder> {
        self.buy.iter().chain(self.sell.iter())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.buy.is_none() && self.sell.is_none()
    }

    /// Number of live orders on `side`. Never more than one.
    pub fn count_side(&self, side: Side) -> usize {
        self.iter().filter(|o| o.side == side).count()
    }
}
