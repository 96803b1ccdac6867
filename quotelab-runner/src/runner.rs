//! Session runner: wires config, ticks, replay simulator and the backtest loop.
//!
//! Three entry points:
//! - `run_session()`: pre-loaded ticks, no I/O
//! - `run_file()`: loads a tick CSV, then runs
//! - `run_batch()`: many tick files in parallel, results in input order

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{info, info_span, warn};

use quotelab_core::backtest::{BacktestError, BacktestLoop};
use quotelab_core::domain::Tick;
use quotelab_core::simulator::ReplaySimulator;

use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::{dataset_hash, load_ticks, LoadError};
use crate::result::{BacktestResult, SCHEMA_VERSION};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("session aborted: {0}")]
    Session(#[from] BacktestError),
}

/// Run one session over pre-loaded ticks.
pub fn run_session(config: &BacktestConfig, ticks: &[Tick]) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let run_id = config.run_id();
    let dataset_hash = dataset_hash(ticks);

    let span = info_span!(
        "session",
        name = %config.session.name,
        run = %&run_id[..12],
        data = %&dataset_hash[..8],
    );
    let _guard = span.enter();
    info!(ticks = ticks.len(), "replaying");

    let mut sim = ReplaySimulator::new(ticks.to_vec(), &config.simulator);
    let mut bt = BacktestLoop::new(
        &config.strategy,
        &config.lifecycle,
        &config.guard_params(),
        &config.loop_params(),
    );
    let session = bt.run(&mut sim)?;

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        dataset_hash,
        created_at: chrono::Utc::now().to_rfc3339(),
        tick_count: ticks.len(),
        config: config.clone(),
        summary: session.summary,
        counters: session.counters,
        pnl_curve: session.pnl_curve,
        journal: session.journal,
        fills: sim.fills().to_vec(),
    })
}

/// Load a tick CSV and run one session over it.
pub fn run_file(config: &BacktestConfig, path: &Path) -> Result<BacktestResult, RunError> {
    let ticks = load_ticks(path)?;
    run_session(config, &ticks)
}

/// Run every file in parallel. Sessions share nothing but the config.
pub fn run_batch(
    config: &BacktestConfig,
    paths: &[PathBuf],
) -> Vec<(PathBuf, Result<BacktestResult, RunError>)> {
    let results: Vec<_> = paths
        .par_iter()
        .map(|path| (path.clone(), run_file(config, path)))
        .collect();
    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    if failed > 0 {
        warn!(failed, total = results.len(), "batch finished with failures");
    } else {
        info!(total = results.len(), "batch finished");
    }
    results
}
