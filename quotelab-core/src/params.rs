//! Engine parameters with the reference defaults.
//!
//! These are plain serde structs; file loading and validation live in the runner.

use serde::{Deserialize, Serialize};

use crate::domain::TimeInForce;

/// 100 ms in nanoseconds.
pub const DEFAULT_QUANTUM_NS: i64 = 100_000_000;

/// SMA signal and order planning parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrategyParams {
    /// Rolling window capacity (number of mid-prices).
    pub window: usize,
    /// Sell when mid > avg * (1 + sell_band).
    pub sell_band: f64,
    /// Buy when mid < avg * (1 - buy_band).
    pub buy_band: f64,
    /// Sell limit = mid * (1 - sell_offset).
    pub sell_offset: f64,
    /// Buy limit = mid * (1 + buy_offset).
    pub buy_offset: f64,
    /// Fixed order quantity.
    pub lot: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            window: 20,
            sell_band: 0.01,
            buy_band: 0.01,
            sell_offset: 0.001,
            buy_offset: 0.001,
            lot: 100.0,
        }
    }
}

/// How the lifecycle manager reconciles live orders against the desired set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Cancel every cancellable live order, then submit every desired order.
    #[default]
    CancelAll,
    /// Only cancel what is no longer desired; only submit what is not already live.
    Diff,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LifecycleParams {
    pub policy: ReconcilePolicy,
    pub time_in_force: TimeInForce,
    /// Upper bound on the acknowledgement wait after a submission.
    pub ack_timeout_ns: i64,
    /// Consecutive ticks ending in an ack timeout before the session is aborted.
    pub max_consecutive_ack_timeouts: u32,
}

impl Default for LifecycleParams {
    fn default() -> Self {
        Self {
            policy: ReconcilePolicy::CancelAll,
            time_in_force: TimeInForce::PostOnly,
            ack_timeout_ns: 1_000_000_000,
            max_consecutive_ack_timeouts: 3,
        }
    }
}

/// One sliding rate-limit window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RateLimitWindow {
    pub max_requests: usize,
    pub window_ns: i64,
}

/// Pre-submit guard configuration. `None` disables a guard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GuardParams {
    /// Maximum distance of a limit price beyond the touch, as a fraction.
    pub fat_finger_pct: Option<f64>,
    pub rate_limit: Option<Vec<RateLimitWindow>>,
}

impl GuardParams {
    /// The exchange's published limits: 120 per minute and 10 per second.
    pub fn reference_rate_limit() -> Vec<RateLimitWindow> {
        vec![
            RateLimitWindow {
                max_requests: 120,
                window_ns: 60_000_000_000,
            },
            RateLimitWindow {
                max_requests: 10,
                window_ns: 1_000_000_000,
            },
        ]
    }
}

impl Default for GuardParams {
    fn default() -> Self {
        Self {
            fat_finger_pct: Some(0.05),
            rate_limit: None,
        }
    }
}

/// Replay simulator settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimParams {
    pub tick_size: f64,
    pub lot_size: f64,
    pub maker_fee: f64,
    pub taker_fee: f64,
    /// Submit-to-ack latency.
    pub order_latency_ns: i64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            tick_size: 0.5,
            lot_size: 1.0,
            maker_fee: 0.0002,
            taker_fee: 0.0007,
            order_latency_ns: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoopParams {
    /// Simulated time advanced per loop step.
    pub quantum_ns: i64,
    /// Keep a per-tick decision journal in the session result.
    pub record_journal: bool,
}

impl LoopParams {
    /// Number of loop steps in a 365-day year; used to annualise the Sharpe ratio.
    pub fn periods_per_year(&self) -> f64 {
        const YEAR_NS: f64 = 365.0 * 86_400.0 * 1e9;
        if self.quantum_ns <= 0 {
            return 0.0;
        }
        YEAR_NS / self.quantum_ns as f64
    }
}

impl Default for LoopParams {
    fn default() -> Self {
        Self {
            quantum_ns: DEFAULT_QUANTUM_NS,
            record_journal: true,
        }
    }
}
