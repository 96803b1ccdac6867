//! Session result persisted as an artifact.

use serde::{Deserialize, Serialize};

use quotelab_core::backtest::{PnlPoint, SessionCounters, TickRecord};
use quotelab_core::domain::Fill;
use quotelab_core::stats::StatsSummary;

use crate::config::{BacktestConfig, RunId};

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single session.
///
/// Contains:
/// - The three headline figures and fill totals (`summary`)
/// - Lifecycle counters
/// - The PnL curve with running drawdown
/// - The per-tick decision journal (empty when disabled) and the fill tape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Hash of the configuration.
    pub run_id: RunId,

    /// BLAKE3 over the replayed ticks.
    pub dataset_hash: String,

    /// RFC 3339 creation time.
    pub created_at: String,

    pub tick_count: usize,
    pub config: BacktestConfig,
    pub summary: StatsSummary,
    pub counters: SessionCounters,
    pub pnl_curve: Vec<PnlPoint>,
    #[serde(default)]
    pub journal: Vec<TickRecord>,
    #[serde(default)]
    pub fills: Vec<Fill>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    /// Short label for directory names and log lines.
    pub fn label(&self) -> String {
        let run: String = self.run_id.chars().take(12).collect();
        let data: String = self.dataset_hash.chars().take(8).collect();
        format!("{run}-{data}")
    }
}
