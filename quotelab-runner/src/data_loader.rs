//! Tick loading for the runner.
//!
//! Two sources:
//! 1. CSV files with header `timestamp_ns,best_bid,best_ask,traded_volume`
//! 2. Seeded synthetic random walks, for development and benchmarks
//!
//! Loaded streams must be non-empty with non-decreasing timestamps.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use quotelab_core::domain::Tick;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} contains no ticks")]
    Empty { path: PathBuf },

    #[error("{path}: timestamp goes backwards at row {row} ({current_ns} < {previous_ns})")]
    NonMonotonic {
        path: PathBuf,
        row: usize,
        previous_ns: i64,
        current_ns: i64,
    },
}

#[derive(Debug, Deserialize)]
struct TickRow {
    timestamp_ns: i64,
    best_bid: f64,
    best_ask: f64,
    traded_volume: f64,
}

/// Read a tick CSV file.
pub fn load_ticks(path: &Path) -> Result<Vec<Tick>, LoadError> {
    let csv_err = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let mut ticks = Vec::new();
    for (i, row) in reader.deserialize::<TickRow>().enumerate() {
        let row = row.map_err(csv_err)?;
        if let Some(prev) = ticks.last().map(|t: &Tick| t.timestamp_ns) {
            if row.timestamp_ns < prev {
                return Err(LoadError::NonMonotonic {
                    path: path.to_path_buf(),
                    row: i + 1,
                    previous_ns: prev,
                    current_ns: row.timestamp_ns,
                });
            }
        }
        ticks.push(Tick::new(
            row.timestamp_ns,
            row.best_bid,
            row.best_ask,
            row.traded_volume,
        ));
    }

    if ticks.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    debug!(path = %path.display(), ticks = ticks.len(), "loaded ticks");
    Ok(ticks)
}

/// Write ticks in the format `load_ticks` reads.
pub fn write_ticks(path: &Path, ticks: &[Tick]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["timestamp_ns", "best_bid", "best_ask", "traded_volume"])?;
    for t in ticks {
        writer.write_record([
            t.timestamp_ns.to_string(),
            t.best_bid.to_string(),
            t.best_ask.to_string(),
            t.traded_volume.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Deterministic BLAKE3 hash over every tick field, in stream order.
pub fn dataset_hash(ticks: &[Tick]) -> String {
    let mut hasher = blake3::Hasher::new();
    for t in ticks {
        hasher.update(&t.timestamp_ns.to_le_bytes());
        hasher.update(&t.best_bid.to_le_bytes());
        hasher.update(&t.best_ask.to_le_bytes());
        hasher.update(&t.traded_volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Parameters of a synthetic tick stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyntheticSpec {
    pub count: usize,
    pub seed: u64,
    pub start_price: f64,
    /// Quoted spread, split evenly around the mid.
    pub spread: f64,
    pub step_ns: i64,
    /// Maximum fractional mid move per tick.
    pub volatility: f64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            count: 10_000,
            seed: 42,
            start_price: 100.0,
            spread: 0.5,
            step_ns: 100_000_000,
            volatility: 0.002,
        }
    }
}

/// Generate a seeded random-walk tick stream.
///
/// The same spec always yields the same ticks.
pub fn synthetic_ticks(spec: &SyntheticSpec) -> Vec<Tick> {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let half_spread = spec.spread.abs() / 2.0;
    let floor = half_spread + spec.start_price.abs() * 0.01;
    let mut mid = spec.start_price;

    (0..spec.count)
        .map(|i| {
            if i > 0 && spec.volatility > 0.0 {
                let shock: f64 = rng.gen_range(-spec.volatility..spec.volatility);
                mid = (mid * (1.0 + shock)).max(floor);
            }
            let volume = rng.gen_range(0.0..200.0_f64).round();
            Tick::new(
                i as i64 * spec.step_ns,
                mid - half_spread,
                mid + half_spread,
                volume,
            )
        })
        .collect()
}
