use anyhow::{bail, Context, Result};
use clap::Parser;
use config_manager::SystemConfig;
use job_orchestrator::AnalysisEngine;
use overlap_core::{parse_time_input, read_entries_csv, write_trades_csv, ScanStatus, TokenEntry};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Find wallets that traded two or more of the given tokens inside their time windows
#[derive(Parser, Debug)]
#[command(name = "overlap_scanner", version, about, long_about = None)]
struct Args {
    /// Token entry as TOKEN,START,END or just TOKEN with --start/--end (repeatable)
    #[arg(long = "entry", value_name = "TOKEN[,START,END]")]
    entries: Vec<String>,

    /// CSV file with `token` or `token,start,end` per line
    #[arg(long)]
    entries_file: Option<PathBuf>,

    /// Default window start for token-only entries (unix ms, RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    start: Option<String>,

    /// Default window end for token-only entries
    #[arg(long)]
    end: Option<String>,

    /// Configuration file (defaults to config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the overlap wallets' trade rows after the wallet list
    #[arg(long)]
    trades: bool,

    /// Write the overlap wallets' trade rows to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Cancel the run after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only results
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,overlap_scanner=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SystemConfig::load_from_path(path)?,
        None => SystemConfig::load()?,
    };
    if let Some(seconds) = args.deadline_secs {
        config.scanner.deadline_seconds = Some(seconds);
    }

    let entries = collect_entries(&args)?;
    let include_trades = args.trades || args.csv.is_some() || config.export.include_trades;

    let engine = AnalysisEngine::from_config(&config)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing with partial results");
            ctrl_c.cancel();
        }
    });

    let report = engine.run(&entries, include_trades, &cancel).await?;

    for scan in &report.scans {
        match &scan.status {
            ScanStatus::Completed => info!(
                "{}: {} pages, {} transactions in window, {} balance changes",
                scan.token, scan.pages, scan.references_in_window, scan.balance_changes
            ),
            ScanStatus::Skipped { reason } => warn!("{}: skipped ({})", scan.token, reason),
            ScanStatus::Failed { reason } => warn!(
                "{}: failed after {} pages, results partial ({})",
                scan.token, scan.pages, reason
            ),
            ScanStatus::Cancelled => warn!("{}: cancelled after {} pages", scan.token, scan.pages),
        }
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for wallet in &report.wallets {
        writeln!(out, "{}", wallet)?;
    }

    if args.trades {
        writeln!(out)?;
        write_trades_csv(&mut out, &report.trades)?;
    }

    if let Some(path) = &args.csv {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_trades_csv(BufWriter::new(file), &report.trades)?;
        info!("Wrote {} trade rows to {}", report.trades.len(), path.display());
    }

    info!(
        "Run {} found {} overlap wallets",
        report.run_id,
        report.wallets.len()
    );

    Ok(())
}

/// Entries from `--entry` flags followed by the entries file, all validated before any scan
fn collect_entries(args: &Args) -> Result<Vec<TokenEntry>> {
    let default_window = match (&args.start, &args.end) {
        (Some(start), Some(end)) => Some((parse_time_input(start)?, parse_time_input(end)?)),
        (None, None) => None,
        _ => bail!("--start and --end must be given together"),
    };

    let mut entries = Vec::new();

    for raw in &args.entries {
        let parsed = read_entries_csv(raw.as_bytes(), default_window)
            .with_context(|| format!("Invalid --entry {:?}", raw))?;
        entries.extend(parsed);
    }

    if let Some(path) = &args.entries_file {
        let file = File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let parsed = read_entries_csv(file, default_window)
            .with_context(|| format!("Invalid entries file {}", path.display()))?;
        entries.extend(parsed);
    }

    if entries.is_empty() {
        bail!("No token entries given; use --entry or --entries-file");
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::parse_from(std::iter::once("overlap_scanner").chain(argv.iter().copied()))
    }

    #[test]
    fn test_entry_flags_with_explicit_windows() {
        let entries = collect_entries(&args(&[
            "--entry",
            "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v,1704067200000,1704153600000",
            "--entry",
            "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263,2024-01-01,2024-01-02",
        ]))
        .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].window, entries[1].window);
        assert_eq!(entries[0].window.start, 1_704_067_200);
    }

    #[test]
    fn test_token_only_entries_use_default_window() {
        let entries = collect_entries(&args(&[
            "--entry",
            "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            "--start",
            "2024-01-01T00:00:00Z",
            "--end",
            "1704153600000",
        ]))
        .unwrap();

        assert_eq!(entries[0].window.start, 1_704_067_200);
        assert_eq!(entries[0].window.end, 1_704_153_600);
    }

    #[test]
    fn test_input_shape_errors() {
        assert!(collect_entries(&args(&[])).is_err());
        assert!(collect_entries(&args(&["--entry", "Mint"])).is_err());
        assert!(collect_entries(&args(&["--entry", "Mint", "--start", "0"])).is_err());
        assert!(collect_entries(&args(&["--entry", "Mint,2024-01-02,2024-01-01"])).is_err());
    }
}
