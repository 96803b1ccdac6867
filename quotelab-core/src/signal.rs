//! SMA band signal over a fixed-capacity rolling window of mid-prices.
//!
//! The window is constructed up front with its capacity; there is no lazily
//! created history. Before the window fills, the average is taken over the
//! samples present (no padding).

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::domain::Tick;
use crate::params::StrategyParams;

/// Directional intent for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    Hold,
    Buy,
    Sell,
}

/// Signal plus the values that produced it. Not persisted across ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub mid_price: f64,
    pub average: f64,
    pub window_len: usize,
}

impl Signal {
    /// Hold emitted for a tick without a usable mid-price.
    pub fn hold_without_price() -> Self {
        Self {
            kind: SignalKind::Hold,
            mid_price: f64::NAN,
            average: f64::NAN,
            window_len: 0,
        }
    }
}

/// FIFO buffer of the last `capacity` mid-prices.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    prices: VecDeque<f64>,
    capacity: usize,
}

impl PriceWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            prices: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a price, evicting the oldest entry on overflow.
    pub fn push(&mut self, price: f64) {
        self.prices.push_back(price);
        if self.prices.len() > self.capacity {
            self.prices.pop_front();
        }
    }

    /// Arithmetic mean of the current contents. `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.prices.is_empty() {
            return None;
        }
        Some(self.prices.iter().sum::<f64>() / self.prices.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_warm(&self) -> bool {
        self.prices.len() == self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.prices.iter()
    }
}

#[derive(Debug, Clone)]
pub struct SignalEngine {
    window: PriceWindow,
    sell_band: f64,
    buy_band: f64,
}

impl SignalEngine {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            window: PriceWindow::new(params.window),
            sell_band: params.sell_band,
            buy_band: params.buy_band,
        }
    }

    /// Record `mid_price` and classify it against the window average.
    ///
    /// The new price is part of the average it is compared with.
    pub fn observe(&mut self, mid_price: f64) -> Signal {
        self.window.push(mid_price);
        let average = self.window.mean().unwrap_or(mid_price);
        let kind = if mid_price > average * (1.0 + self.sell_band) {
            SignalKind::Sell
        } else if mid_price < average * (1.0 - self.buy_band) {
            SignalKind::Buy
        } else {
            SignalKind::Hold
        };
        Signal {
            kind,
            mid_price,
            average,
            window_len: self.window.len(),
        }
    }

    /// Observe a tick's mid-price; ticks without a valid mid leave the window untouched.
    pub fn observe_tick(&mut self, tick: &Tick) -> Signal {
        match tick.mid() {
            Some(mid) => self.observe(mid),
            None => Signal::hold_without_price(),
        }
    }

    pub fn window(&self) -> &PriceWindow {
        &self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SignalEngine {
        SignalEngine::new(&StrategyParams::default())
    }

    #[test]
    fn window_evicts_oldest() {
        let mut w = PriceWindow::new(3);
        for p in [1.0, 2.0, 3.0, 4.0] {
            w.push(p);
        }
        assert_eq!(w.iter().copied().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
        assert!(w.is_warm());
        assert_eq!(w.mean(), Some(3.0));
    }

    #[test]
    fn mean_before_warmup_uses_available_samples() {
        let mut w = PriceWindow::new(20);
        assert_eq!(w.mean(), None);
        w.push(10.0);
        w.push(20.0);
        assert_eq!(w.mean(), Some(15.0));
        assert!(!w.is_warm());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let w = PriceWindow::new(0);
        assert_eq!(w.capacity(), 1);
    }

    #[test]
    fn first_observation_holds() {
        let mut e = engine();
        let s = e.observe(100.0);
        assert_eq!(s.kind, SignalKind::Hold);
        assert_eq!(s.average, 100.0);
        assert_eq!(s.window_len, 1);
    }

    #[test]
    fn spike_above_band_sells() {
        let mut e = engine();
        for _ in 0..19 {
            e.observe(100.0);
        }
        // avg = (1900 + 110) / 20 = 100.5, 110 > 101.505
        let s = e.observe(110.0);
        assert_eq!(s.kind, SignalKind::Sell);
        assert!((s.average - 100.5).abs() < 1e-12);
    }

    #[test]
    fn drop_below_band_buys() {
        let mut e = engine();
        for _ in 0..19 {
            e.observe(100.0);
        }
        let s = e.observe(90.0);
        assert_eq!(s.kind, SignalKind::Buy);
    }

    #[test]
    fn small_move_holds() {
        let mut e = engine();
        for _ in 0..19 {
            e.observe(100.0);
        }
        assert_eq!(e.observe(100.5).kind, SignalKind::Hold);
        assert_eq!(e.observe(99.5).kind, SignalKind::Hold);
    }

    fn half_band_pair() -> SignalEngine {
        SignalEngine::new(&StrategyParams {
            window: 2,
            sell_band: 0.5,
            buy_band: 0.5,
            ..StrategyParams::default()
        })
    }

    #[test]
    fn mid_exactly_on_sell_band_holds() {
        let mut e = half_band_pair();
        e.observe(1.0);
        // avg = 2.0, sell threshold = 3.0
        let s = e.observe(3.0);
        assert_eq!(s.average, 2.0);
        assert_eq!(s.kind, SignalKind::Hold);
    }

    #[test]
    fn mid_exactly_on_buy_band_holds() {
        let mut e = half_band_pair();
        e.observe(3.0);
        // avg = 2.0, buy threshold = 1.0
        let s = e.observe(1.0);
        assert_eq!(s.average, 2.0);
        assert_eq!(s.kind, SignalKind::Hold);
    }

    #[test]
    fn mid_just_past_the_band_trades() {
        let mut e = half_band_pair();
        e.observe(1.0);
        assert_eq!(e.observe(3.01).kind, SignalKind::Sell);

        let mut e = half_band_pair();
        e.observe(3.0);
        assert_eq!(e.observe(0.99).kind, SignalKind::Buy);
    }

    #[test]
    fn empty_book_tick_does_not_touch_window() {
        let mut e = engine();
        e.observe(100.0);
        let s = e.observe_tick(&Tick::new(0, 0.0, 0.0, 0.0));
        assert_eq!(s.kind, SignalKind::Hold);
        assert!(s.mid_price.is_nan());
        assert_eq!(e.window().len(), 1);
    }
}
