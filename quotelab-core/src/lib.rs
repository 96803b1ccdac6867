//! QuoteLab Core: engine for backtesting a single-instrument SMA quoting strategy.
//!
//! This crate contains the strategy-execution loop and performs no I/O:
//! - Domain types (ticks, desired/live orders, fills, instrument rounding)
//! - SMA band signal over a fixed-capacity price window
//! - Order planning and pre-submit guards
//! - Order lifecycle reconciliation against a [`simulator::MarketSimulator`]
//! - Statistics (PnL series, Sharpe ratio, max drawdown)
//! - The step-driven backtest loop and a deterministic replay simulator

pub mod backtest;
pub mod domain;
pub mod guards;
pub mod lifecycle;
pub mod params;
pub mod planner;
pub mod signal;
pub mod simulator;
pub mod stats;

pub use backtest::{BacktestError, BacktestLoop, LoopState, SessionCounters, SessionResult};
pub use params::{GuardParams, LifecycleParams, LoopParams, SimParams, StrategyParams};
