use serde::{Deserialize, Serialize};
use std::fmt;

use super::order::Side;

/// Deterministic order id: one per side.
///
/// The strategy quotes at most one order per side, so the id is derived from
/// the side alone. Re-submitting a side reuses its tag, which makes two live
/// orders with the same id impossible to express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderTag(Side);

impl OrderTag {
    pub const BUY: OrderTag = OrderTag(Side::Buy);
    pub const SELL: OrderTag = OrderTag(Side::Sell);

    pub fn for_side(side: Side) -> Self {
        Self(side)
    }

    pub fn side(&self) -> Side {
        self.0
    }

    pub fn as_str(&self) -> &'static str {
        match self.0 {
            Side::Buy => "buy_order",
            Side::Sell => "sell_order",
        }
    }
}

impl fmt::Display for OrderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_stable_per_side() {
        assert_eq!(OrderTag::for_side(Side::Buy).to_string(), "buy_order");
        assert_eq!(OrderTag::for_side(Side::Sell).to_string(), "sell_order");
        assert_eq!(OrderTag::for_side(Side::Buy), OrderTag::BUY);
        assert_ne!(OrderTag::BUY, OrderTag::SELL);
    }

    #[test]
    fn tag_roundtrips_side() {
        for side in [Side::Buy, Side::Sell] {
            assert_eq!(OrderTag::for_side(side).side(), side);
        }
    }
}
