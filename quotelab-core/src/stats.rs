//! Session statistics.
//!
//! The accumulator stores the ordered `(timestamp_ns, pnl)` series and the last
//! simulator snapshot. Every statistic is a pure function of the series, so the
//! reported values can always be recomputed from what is stored.

use serde::{Deserialize, Serialize};

use crate::domain::SimSnapshot;

/// End-of-session figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub total_pnl: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub samples: usize,
    pub final_position: f64,
    pub fills: u64,
    pub fees_paid: f64,
}

#[derive(Debug, Clone)]
pub struct StatsAccumulator {
    timestamps: Vec<i64>,
    pnl: Vec<f64>,
    last: Option<SimSnapshot>,
    periods_per_year: f64,
}

impl StatsAccumulator {
    /// `periods_per_year` scales the per-step Sharpe ratio to an annual figure.
    pub fn new(periods_per_year: f64) -> Self {
        Self {
            timestamps: Vec::new(),
            pnl: Vec::new(),
            last: None,
            periods_per_year,
        }
    }

    /// Append the snapshot's mark-to-market PnL.
    pub fn record(&mut self, snapshot: &SimSnapshot) {
        self.timestamps.push(snapshot.timestamp_ns);
        self.pnl.push(snapshot.pnl);
        self.last = Some(*snapshot);
    }

    pub fn pnl_series(&self) -> &[f64] {
        &self.pnl
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.pnl.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pnl.is_empty()
    }

    /// Final value of the series, 0.0 when nothing was recorded.
    pub fn total_pnl(&self) -> f64 {
        self.pnl.last().copied().unwrap_or(0.0)
    }

    pub fn sharpe_ratio(&self) -> f64 {
        sharpe_ratio(&self.pnl, self.periods_per_year)
    }

    pub fn max_drawdown(&self) -> f64 {
        max_drawdown(&self.pnl)
    }

    pub fn drawdown_series(&self) -> Vec<f64> {
        drawdown_series(&self.pnl)
    }

    pub fn summary(&self) -> StatsSummary {
        let last = self.last.unwrap_or_default();
        StatsSummary {
            total_pnl: self.total_pnl(),
            sharpe: self.sharpe_ratio(),
            max_drawdown: self.max_drawdown(),
            samples: self.pnl.len(),
            final_position: last.position,
            fills: last.fill_count,
            fees_paid: last.fees_paid,
        }
    }
}

// ─── Pure series functions ──────────────────────────────────────────

/// Step-over-step PnL changes.
pub fn pnl_deltas(pnl: &[f64]) -> Vec<f64> {
    pnl.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Annualised Sharpe ratio of PnL deltas.
///
/// Sharpe = mean(Δpnl) / std(Δpnl) * sqrt(periods_per_year), sample std.
/// Returns 0.0 for fewer than two deltas or zero variance.
pub fn sharpe_ratio(pnl: &[f64], periods_per_year: f64) -> f64 {
    let deltas = pnl_deltas(pnl);
    if deltas.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(&deltas);
    let std = std_dev(&deltas);
    if std < 1e-15 || !std.is_finite() {
        return 0.0;
    }
    (mean / std) * periods_per_year.max(0.0).sqrt()
}

/// Largest peak-to-trough decline of the PnL series, as a non-negative magnitude.
pub fn max_drawdown(pnl: &[f64]) -> f64 {
    drawdown_series(pnl).into_iter().fold(0.0, f64::max)
}

/// Running drawdown (peak so far minus current value) at each point.
pub fn drawdown_series(pnl: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    pnl.iter()
        .map(|&v| {
            if v > peak {
                peak = v;
            }
            peak - v
        })
        .collect()
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
