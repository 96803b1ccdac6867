//! Top-of-book tick.

use serde::{Deserialize, Serialize};

/// One observation of the top of book, pulled from the simulator once per loop step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Exchange timestamp in nanoseconds.
    pub timestamp_ns: i64,
    pub best_bid: f64,
    pub best_ask: f64,
    pub traded_volume: f64,
}

impl Tick {
    pub fn new(timestamp_ns: i64, best_bid: f64, best_ask: f64, traded_volume: f64) -> Self {
        Self {
            timestamp_ns,
            best_bid,
            best_ask,
            traded_volume,
        }
    }

    /// Average of best bid and best ask.
    ///
    /// `None` when either side is missing (non-finite or non-positive) or the
    /// book is crossed.
    pub fn mid(&self) -> Option<f64> {
        let valid = |p: f64| p.is_finite() && p > 0.0;
        if !valid(self.best_bid) || !valid(self.best_ask) || self.best_bid > self.best_ask {
            return None;
        }
        Some((self.best_bid + self.best_ask) / 2.0)
    }

    pub fn spread(&self) -> Option<f64> {
        self.mid().map(|_| self.best_ask - self.best_bid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mid_of_valid_book() {
        let tick = Tick::new(0, 99.5, 100.5, 10.0);
        assert_eq!(tick.mid(), Some(100.0));
        assert_eq!(tick.spread(), Some(1.0));
    }

    #[test]
    fn empty_side_has_no_mid() {
        assert_eq!(Tick::new(0, 0.0, 100.5, 0.0).mid(), None);
        assert_eq!(Tick::new(0, 99.5, f64::NAN, 0.0).mid(), None);
        assert_eq!(Tick::new(0, -1.0, 100.5, 0.0).mid(), None);
    }

    #[test]
    fn crossed_book_has_no_mid() {
        assert_eq!(Tick::new(0, 101.0, 100.0, 0.0).mid(), None);
    }

    #[test]
    fn locked_book_is_valid() {
        assert_eq!(Tick::new(0, 100.0, 100.0, 0.0).mid(), Some(100.0));
    }
}
