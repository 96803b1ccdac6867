//! Signal → desired order set.

use crate::domain::{DesiredOrder, DesiredOrders, Side};
use crate::params::StrategyParams;
use crate::signal::{Signal, SignalKind};

#[derive(Debug, Clone)]
pub struct OrderPlanner {
    sell_offset: f64,
    buy_offset: f64,
    lot: f64,
}

impl OrderPlanner {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            sell_offset: params.sell_offset,
            buy_offset: params.buy_offset,
            lot: params.lot,
        }
    }

    /// Map a signal to at most one desired order. Prices are raw, unrounded.
    pub fn plan(&self, signal: &Signal, mid_price: f64) -> DesiredOrders {
        if !mid_price.is_finite() {
            return DesiredOrders::none();
        }
        match signal.kind {
            SignalKind::Hold => DesiredOrders::none(),
            SignalKind::Sell => DesiredOrders::single(DesiredOrder::new(
                Side::Sell,
                mid_price * (1.0 - self.sell_offset),
                self.lot,
            )),
            SignalKind::Buy => DesiredOrders::single(DesiredOrder::new(
                Side::Buy,
                mid_price * (1.0 + self.buy_offset),
                self.lot,
            )),
        }
    }
}
