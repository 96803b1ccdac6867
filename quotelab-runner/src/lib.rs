//! QuoteLab Runner: session orchestration around `quotelab-core`.
//!
//! This crate provides:
//! - TOML configuration with validation and content-hashed run ids
//! - Tick loading from CSV and seeded synthetic generation
//! - Single-session and parallel batch runners
//! - Artifact export (JSON manifest, PnL/decision/fill CSVs)
//! - Tracing subscriber setup

pub mod config;
pub mod data_loader;
pub mod export;
pub mod logging;
pub mod result;
pub mod runner;

pub use config::{BacktestConfig, ConfigError, GuardsConfig, RunId, SessionConfig};
pub use data_loader::{
    dataset_hash, load_ticks, synthetic_ticks, write_ticks, LoadError, SyntheticSpec,
};
pub use export::{load_artifacts, save_artifacts};
pub use logging::init_tracing;
pub use result::{BacktestResult, SCHEMA_VERSION};
pub use runner::{run_batch, run_file, run_session, RunError};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<BacktestConfig>();
        assert_sync::<BacktestConfig>();
        assert_send::<SyntheticSpec>();
        assert_sync::<SyntheticSpec>();
    }

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
    }
}
