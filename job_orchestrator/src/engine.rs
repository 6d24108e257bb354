use crate::scanner::{HistoryScanner, ScanSettings};
use crate::{OrchestratorError, Result};
use chrono::Utc;
use config_manager::SystemConfig;
use futures::stream::{self, StreamExt};
use overlap_core::{AnalysisReport, OverlapAggregator, ScanSummary, TokenEntry, TokenEntryInput};
use retry_utils::BackoffPolicy;
use solana_client::{LedgerClient, SolanaClientConfig, SolanaRpcClient};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use tx_parser::{DexProgramSet, SwapDetector};
use uuid::Uuid;

/// Run-level knobs: how many tokens to scan at once and when to give up
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub scan: ScanSettings,
    pub token_concurrency: usize,
    pub deadline: Option<Duration>,
    pub include_trades: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            scan: ScanSettings::default(),
            token_concurrency: 1,
            deadline: None,
            include_trades: false,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            scan: ScanSettings::from_config(&config.scanner),
            token_concurrency: config.scanner.token_concurrency.max(1),
            deadline: config.scanner.deadline_seconds.map(Duration::from_secs),
            include_trades: config.export.include_trades,
        }
    }
}

/// Scans every token entry and reports wallets that traded two or more of them
pub struct AnalysisEngine<L: LedgerClient> {
    scanner: HistoryScanner<L>,
    token_concurrency: usize,
    deadline: Option<Duration>,
    include_trades: bool,
}

impl AnalysisEngine<SolanaRpcClient> {
    /// Engine backed by the JSON-RPC ledger client described by `config`
    pub fn from_config(config: &SystemConfig) -> Result<Self> {
        config.validate()?;

        let solana_config = SolanaClientConfig {
            rpc_url: config.solana.rpc_url.clone(),
            rpc_timeout_seconds: config.solana.rpc_timeout_seconds,
            max_concurrent_requests: config.solana.max_concurrent_requests,
            backoff: BackoffPolicy::new(
                config.solana.max_retries,
                config.solana.retry_base_delay_ms,
                config.solana.retry_max_delay_ms,
            ),
        };
        let ledger = SolanaRpcClient::new(solana_config)?;

        info!("🔗 Ledger client ready at {}", ledger.rpc_url());

        let detector = SwapDetector::new(DexProgramSet::from_ids(&config.dex.program_ids));

        Ok(Self::new(
            Arc::new(ledger),
            detector,
            EngineSettings::from_config(config),
        ))
    }
}

impl<L: LedgerClient> AnalysisEngine<L> {
    pub fn new(ledger: Arc<L>, detector: SwapDetector, settings: EngineSettings) -> Self {
        Self {
            scanner: HistoryScanner::new(ledger, detector, settings.scan),
            token_concurrency: settings.token_concurrency.max(1),
            deadline: settings.deadline,
            include_trades: settings.include_trades,
        }
    }

    pub fn include_trades_by_default(&self) -> bool {
        self.include_trades
    }

    /// Wallets trading two or more of the given tokens, from millisecond inputs
    pub async fn overlap_wallets(&self, inputs: Vec<TokenEntryInput>) -> Result<Vec<String>> {
        let entries = entries_from_inputs(inputs)?;
        let report = self
            .run(&entries, false, &CancellationToken::new())
            .await?;
        Ok(report.wallets)
    }

    /// Scan every entry and aggregate.
    ///
    /// Only input-shape problems fail the run. Invalid addresses, ledger failures
    /// and cancellation show up per token in `scans`, with partial results kept.
    pub async fn run(
        &self,
        entries: &[TokenEntry],
        include_trades: bool,
        cancel: &CancellationToken,
    ) -> Result<AnalysisReport> {
        if entries.is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "at least one token entry is required".to_string(),
            ));
        }

        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        let run_id = Uuid::new_v4();
        let span = info_span!("analysis_run", %run_id);

        self.run_entries(run_id, entries, include_trades, cancel)
            .instrument(span)
            .await
    }

    async fn run_entries(
        &self,
        run_id: Uuid,
        entries: &[TokenEntry],
        include_trades: bool,
        cancel: &CancellationToken,
    ) -> Result<AnalysisReport> {
        let started_at = Utc::now();
        let run_cancel = cancel.child_token();

        let deadline_timer = self.deadline.map(|deadline| {
            let token = run_cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                warn!("⏰ Deadline of {}s reached, cancelling run", deadline.as_secs());
                token.cancel();
            })
        });

        info!(
            "🚀 Starting analysis of {} tokens (concurrency {})",
            entries.len(),
            self.token_concurrency
        );

        let aggregator = Mutex::new(if include_trades {
            OverlapAggregator::with_trade_retention()
        } else {
            OverlapAggregator::new()
        });

        let scan_futures: Vec<_> = entries
            .iter()
            .map(|entry| self.scan_entry(entry, &run_cancel, &aggregator))
            .collect();
        let scans: Vec<ScanSummary> = stream::iter(scan_futures)
            .buffered(self.token_concurrency)
            .collect()
            .await;

        if let Some(timer) = deadline_timer {
            timer.abort();
        }

        let aggregator = aggregator.into_inner().unwrap_or_else(PoisonError::into_inner);
        let wallets = aggregator.result();
        let wallets_seen = aggregator.wallet_count();
        let trades = if include_trades {
            aggregator.overlap_trades()
        } else {
            Vec::new()
        };

        let report = AnalysisReport {
            run_id,
            started_at,
            completed_at: Utc::now(),
            wallets,
            trades,
            scans,
        };

        info!(
            "🏁 Analysis finished: {} overlap wallets of {} seen across {} tokens{}",
            report.wallets.len(),
            wallets_seen,
            report.scans.len(),
            if report.is_partial() { " (partial)" } else { "" }
        );

        Ok(report)
    }

    async fn scan_entry(
        &self,
        entry: &TokenEntry,
        cancel: &CancellationToken,
        aggregator: &Mutex<OverlapAggregator>,
    ) -> ScanSummary {
        if let Err(e) = entry.mint() {
            warn!("⚠️ Skipping token entry: {}", e);
            return ScanSummary::skipped(&entry.token, e.to_string());
        }

        // Each trade is recorded as it is found; the lock never spans an await
        self.scanner
            .scan(entry, cancel, |trade| {
                aggregator
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .record_trade(trade)
            })
            .await
    }
}

/// Validate caller inputs before any scanning starts
pub fn entries_from_inputs(inputs: Vec<TokenEntryInput>) -> Result<Vec<TokenEntry>> {
    if inputs.is_empty() {
        return Err(OrchestratorError::InvalidInput(
            "at least one token entry is required".to_string(),
        ));
    }

    inputs
        .into_iter()
        .map(|input| TokenEntry::try_from(input).map_err(OrchestratorError::from))
        .collect()
}
