//! QuoteLab CLI: replay backtests of the SMA quoting strategy.
//!
//! Commands:
//! - `run`: one session over a tick CSV or a synthetic stream, artifacts saved to disk
//! - `batch`: many tick files in parallel with one config, one summary line each
//! - `validate`: parse and validate a config, print its run id

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use quotelab_runner::{
    init_tracing, run_batch, run_file, run_session, save_artifacts, synthetic_ticks,
    BacktestConfig, BacktestResult, RunError, SyntheticSpec,
};

#[derive(Parser)]
#[command(
    name = "quotelab",
    about = "QuoteLab CLI: SMA quoting strategy backtester"
)]
struct Cli {
    /// Emit JSON logs instead of pretty output.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one session and save its artifacts.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Tick CSV (timestamp_ns,best_bid,best_ask,traded_volume).
        #[arg(long, conflicts_with = "synthetic")]
        ticks: Option<PathBuf>,

        /// Replay this many synthetic ticks instead of a file.
        #[arg(long)]
        synthetic: Option<usize>,

        /// Seed for the synthetic stream.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Run several tick files in parallel with the same config.
    Batch {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Tick CSV files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Also save artifacts for every successful session.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Parse and validate a config, print its run id.
    Validate {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs).context("failed to install tracing subscriber")?;

    match cli.command {
        Commands::Run {
            config,
            ticks,
            synthetic,
            seed,
            output_dir,
        } => run_cmd(config, ticks, synthetic, seed, output_dir),
        Commands::Batch {
            config,
            files,
            output_dir,
        } => batch_cmd(config, files, output_dir),
        Commands::Validate { config } => validate_cmd(config),
    }
}

fn load_config(path: &Path) -> Result<BacktestConfig> {
    BacktestConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}

fn run_cmd(
    config_path: PathBuf,
    ticks: Option<PathBuf>,
    synthetic: Option<usize>,
    seed: u64,
    output_dir: PathBuf,
) -> Result<()> {
    let config = load_config(&config_path)?;

    let result = match (ticks, synthetic) {
        (Some(path), None) => run_file(&config, &path)?,
        (None, Some(count)) => {
            if count == 0 {
                bail!("--synthetic needs at least one tick");
            }
            let ticks = synthetic_ticks(&SyntheticSpec {
                count,
                seed,
                ..SyntheticSpec::default()
            });
            run_session(&config, &ticks)?
        }
        _ => bail!("one of --ticks or --synthetic is required"),
    };

    print_summary(&result);

    let run_dir = save_artifacts(&result, &output_dir)?;
    info!(dir = %run_dir.display(), "artifacts saved");
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn batch_cmd(config_path: PathBuf, files: Vec<PathBuf>, output_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(&config_path)?;
    let results = run_batch(&config, &files);

    let failed = report_batch(&results, output_dir.as_deref());
    if failed > 0 {
        eprintln!("{failed} of {} sessions failed", results.len());
        std::process::exit(1);
    }
    Ok(())
}

/// Print one line per session and save artifacts when asked; returns the failure count.
///
/// A session whose artifacts cannot be saved counts as failed; the rest are still reported.
fn report_batch(results: &[(PathBuf, Result<BacktestResult, RunError>)], output_dir: Option<&Path>) -> usize {
    let mut failed = 0usize;
    for (path, outcome) in results {
        match outcome {
            Ok(result) => {
                println!(
                    "{}  pnl={:.4}  sharpe={:.3}  max_dd={:.4}  fills={}  rejected={}",
                    path.display(),
                    result.summary.total_pnl,
                    result.summary.sharpe,
                    result.summary.max_drawdown,
                    result.summary.fills,
                    result.counters.rejected,
                );
                if let Some(dir) = output_dir {
                    if let Err(e) = save_artifacts(result, dir) {
                        failed += 1;
                        eprintln!("{}  FAILED to save artifacts: {e:#}", path.display());
                    }
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}  FAILED: {e}", path.display());
            }
        }
    }
    failed
}

fn validate_cmd(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path)?;
    println!("{}", config.run_id());
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let s = &result.summary;
    let c = &result.counters;
    println!();
    println!("=== Session Result ===");
    println!("Session:        {}", result.config.session.name);
    println!("Run:            {}", result.label());
    println!("Ticks:          {}", result.tick_count);
    println!();
    println!("--- Performance ---");
    println!("Total PnL:      {:.4}", s.total_pnl);
    println!("Sharpe:         {:.3}", s.sharpe);
    println!("Max Drawdown:   {:.4}", s.max_drawdown);
    println!("Final Position: {}", s.final_position);
    println!("Fills:          {}", s.fills);
    println!("Fees Paid:      {:.4}", s.fees_paid);
    println!();
    println!("--- Orders ---");
    println!("Submitted:      {}", c.submitted);
    println!("Cancelled:      {}", c.cancelled);
    println!("No-op Cancels:  {}", c.noop_cancels);
    println!("Rejected:       {}", c.rejected);
    println!("Ack Timeouts:   {}", c.ack_timeouts);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_of(paths: &[&str]) -> Vec<(PathBuf, Result<BacktestResult, RunError>)> {
        let config = BacktestConfig::default();
        paths
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let ticks = synthetic_ticks(&SyntheticSpec {
                    count: 50,
                    seed: i as u64,
                    ..SyntheticSpec::default()
                });
                (PathBuf::from(name), run_session(&config, &ticks))
            })
            .collect()
    }

    #[test]
    fn unsaveable_artifacts_count_as_failures_and_the_batch_continues() {
        let dir = tempfile::tempdir().unwrap();
        // a plain file where the output directory should be
        let blocked = dir.path().join("not-a-dir");
        std::fs::write(&blocked, "x").unwrap();

        let results = batch_of(&["a.csv", "b.csv"]);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(report_batch(&results, Some(&blocked)), 2);
    }

    #[test]
    fn saved_batch_reports_no_failures() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");

        let results = batch_of(&["a.csv", "b.csv"]);
        assert_eq!(report_batch(&results, Some(&out)), 0);
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 2);
    }
}
