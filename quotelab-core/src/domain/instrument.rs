use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::order::Side;

/// Instrument metadata for tick size and lot size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub tick_size: f64,
    pub lot_size: f64,
}

impl Instrument {
    pub fn new(tick_size: f64, lot_size: f64) -> Self {
        Self {
            tick_size,
            lot_size,
        }
    }

    /// Side-aware rounding: buy limits round down, sell limits round up.
    ///
    /// Rounding never makes a resting order more aggressive than requested.
    pub fn round_price(&self, price: f64, side: Side) -> f64 {
        if self.tick_size <= 0.0 {
            return price;
        }
        let ticks = price / self.tick_size;
        // Snap values that are a tick multiple up to float noise before flooring/ceiling.
        let nearest = ticks.round();
        let ticks = if (ticks - nearest).abs() < 1e-9 {
            nearest
        } else {
            match side {
                Side::Buy => ticks.floor(),
                Side::Sell => ticks.ceil(),
            }
        };
        ticks * self.tick_size
    }

    /// Round a quantity down to whole lots.
    pub fn round_quantity(&self, qty: f64) -> Result<f64, InstrumentError> {
        if !qty.is_finite() || qty <= 0.0 {
            return Err(InstrumentError::ZeroQuantity { quantity: qty });
        }
        if self.lot_size <= 0.0 {
            return Ok(qty);
        }
        let lots = (qty / self.lot_size + 1e-9).floor();
        if lots < 1.0 {
            return Err(InstrumentError::ZeroQuantity { quantity: qty });
        }
        Ok(lots * self.lot_size)
    }
}

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("quantity {quantity} rounds to zero lots")]
    ZeroQuantity { quantity: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_rounds_down_sell_rounds_up() {
        let inst = Instrument::new(0.5, 1.0);
        assert_eq!(inst.round_price(100.1, Side::Buy), 100.0);
        assert_eq!(inst.round_price(100.1, Side::Sell), 100.5);
        assert_eq!(inst.round_price(99.9, Side::Sell), 100.0);
    }

    #[test]
    fn aligned_price_is_unchanged() {
        let inst = Instrument::new(0.5, 1.0);
        assert_eq!(inst.round_price(100.5, Side::Buy), 100.5);
        assert_eq!(inst.round_price(100.5, Side::Sell), 100.5);
        // 0.1 is not exactly representable; still treated as aligned
        let inst = Instrument::new(0.1, 1.0);
        assert!((inst.round_price(0.3, Side::Buy) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn quantity_rounds_down_to_lots() {
        let inst = Instrument::new(0.5, 10.0);
        assert_eq!(inst.round_quantity(105.0).unwrap(), 100.0);
        assert_eq!(inst.round_quantity(100.0).unwrap(), 100.0);
    }

    #[test]
    fn sub_lot_quantity_is_error() {
        let inst = Instrument::new(0.5, 10.0);
        assert!(matches!(
            inst.round_quantity(5.0),
            Err(InstrumentError::ZeroQuantity { .. })
        ));
        assert!(inst.round_quantity(0.0).is_err());
        assert!(inst.round_quantity(f64::NAN).is_err());
    }
}
