//! Artifact export: JSON manifest and CSV tapes.
//!
//! All persisted manifests carry a `schema_version` field. Newer versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use quotelab_core::backtest::{PnlPoint, TickRecord};
use quotelab_core::domain::Fill;

use crate::result::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: timestamp_ns, pnl, drawdown
pub fn export_pnl_csv(curve: &[PnlPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp_ns", "pnl", "drawdown"])?;
    for p in curve {
        wtr.write_record([
            p.timestamp_ns.to_string(),
            format!("{:.6}", p.pnl),
            format!("{:.6}", p.drawdown),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: timestamp_ns, mid, average, signal, submitted, cancelled, rejections, pnl
///
/// Multi-valued cells are `;`-separated.
pub fn export_decisions_csv(journal: &[TickRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp_ns",
        "mid",
        "average",
        "signal",
        "submitted",
        "cancelled",
        "rejections",
        "pnl",
    ])?;
    for r in journal {
        let submitted = r
            .submitted
            .iter()
            .map(|o| format!("{} {:.4}x{}", o.side, o.limit_price, o.quantity))
            .collect::<Vec<_>>()
            .join(";");
        let cancelled = r
            .cancelled
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(";");
        let rejections = r
            .rejections
            .iter()
            .map(|rej| format!("{}: {}", rej.tag, rej.reason))
            .collect::<Vec<_>>()
            .join(";");
        wtr.write_record([
            r.timestamp_ns.to_string(),
            optional(r.mid),
            optional(r.average),
            format!("{:?}", r.signal),
            submitted,
            cancelled,
            rejections,
            format!("{:.6}", r.pnl),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

/// Columns: timestamp_ns, tag, side, price, quantity, fee, maker
pub fn export_fills_csv(fills: &[Fill]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp_ns", "tag", "side", "price", "quantity", "fee", "maker"])?;
    for f in fills {
        wtr.write_record([
            f.timestamp_ns.to_string(),
            f.tag.to_string(),
            f.side.to_string(),
            format!("{:.6}", f.price),
            format!("{:.6}", f.quantity),
            format!("{:.6}", f.fee),
            f.maker.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for one session.
///
/// Creates `{run_id[..12]}-{dataset_hash[..8]}/` under `output_dir` containing:
/// - `manifest.json`: the full `BacktestResult`
/// - `pnl.csv`: PnL curve with running drawdown
/// - `decisions.csv`: per-tick journal (only when recorded)
/// - `fills.csv`: fill tape (only when there were fills)
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = output_dir.join(result.label());
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(result)?)?;
    std::fs::write(run_dir.join("pnl.csv"), export_pnl_csv(&result.pnl_curve)?)?;
    if !result.journal.is_empty() {
        std::fs::write(
            run_dir.join("decisions.csv"),
            export_decisions_csv(&result.journal)?,
        )?;
    }
    if !result.fills.is_empty() {
        std::fs::write(run_dir.join("fills.csv"), export_fills_csv(&result.fills)?)?;
    }
    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotelab_core::domain::{DesiredOrder, OrderTag, Side};
    use quotelab_core::lifecycle::{Rejection, RejectionReason};
    use quotelab_core::signal::SignalKind;
    use quotelab_core::simulator::RejectReason;

    #[test]
    fn pnl_csv_has_header_and_rows() {
        let csv = export_pnl_csv(&[
            PnlPoint {
                timestamp_ns: 0,
                pnl: 0.0,
                drawdown: 0.0,
            },
            PnlPoint {
                timestamp_ns: 100,
                pnl: -2.5,
                drawdown: 2.5,
            },
        ])
        .unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "timestamp_ns,pnl,drawdown");
        assert_eq!(lines[2], "100,-2.500000,2.500000");
    }

    #[test]
    fn decisions_csv_flattens_orders_and_rejections() {
        let record = TickRecord {
            timestamp_ns: 7,
            mid: Some(110.0),
            average: Some(100.5),
            signal: SignalKind::Sell,
            submitted: vec![DesiredOrder::new(Side::Sell, 109.89, 100.0)],
            cancelled: vec![OrderTag::SELL],
            rejections: vec![Rejection {
                tag: OrderTag::BUY,
                reason: RejectionReason::Venue(RejectReason::WouldCross),
            }],
            pnl: 1.0,
        };
        let csv = export_decisions_csv(&[record]).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("7,110.000000,100.500000,Sell,Sell 109.8900x100,sell_order,"));
        assert!(row.contains("buy_order: venue: would cross the spread"));
    }
}
