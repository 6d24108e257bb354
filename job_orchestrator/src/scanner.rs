use config_manager::ScannerConfig;
use futures::stream::{self, StreamExt};
use overlap_core::{ScanStatus, ScanSummary, TokenEntry, TradeRecord};
use solana_client::{LedgerClient, LedgerError, TransactionDetail, TransactionReference};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tx_parser::SwapDetector;

/// Pagination and pacing for one token's history walk
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub page_limit: usize,
    pub throttle: Duration,
    pub detail_concurrency: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            page_limit: 1000,
            throttle: Duration::from_millis(50),
            detail_concurrency: 1,
        }
    }
}

impl ScanSettings {
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self {
            page_limit: config.page_limit,
            throttle: Duration::from_millis(config.throttle_ms),
            detail_concurrency: config.detail_concurrency.max(1),
        }
    }
}

enum DetailOutcome {
    Fetched(solana_client::Result<Option<TransactionDetail>>),
    Cancelled,
}

/// Walks a token's history newest-first and reports trades inside the entry's window
pub struct HistoryScanner<L: LedgerClient> {
    ledger: Arc<L>,
    detector: SwapDetector,
    settings: ScanSettings,
}

impl<L: LedgerClient> HistoryScanner<L> {
    pub fn new(ledger: Arc<L>, detector: SwapDetector, settings: ScanSettings) -> Self {
        Self {
            ledger,
            detector,
            settings,
        }
    }

    /// Scan one token, calling `on_trade` for every detected balance change.
    ///
    /// Never fails: transport errors end the scan as `Failed` with the trades found
    /// so far already delivered; cancellation ends it as `Cancelled`.
    pub async fn scan<F>(
        &self,
        entry: &TokenEntry,
        cancel: &CancellationToken,
        mut on_trade: F,
    ) -> ScanSummary
    where
        F: FnMut(TradeRecord) + Send,
    {
        let token = entry.token.as_str();
        let window = entry.window;
        let mut summary = ScanSummary::new(token);
        let mut cursor: Option<String> = None;

        debug!(
            "🔎 Scanning {} in window [{}, {}]",
            token, window.start, window.end
        );

        loop {
            if cancel.is_cancelled() {
                summary.status = ScanStatus::Cancelled;
                break;
            }

            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.status = ScanStatus::Cancelled;
                    break;
                }
                page = self.ledger.list_references(token, cursor.as_deref(), self.settings.page_limit) => page,
            };

            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    warn!("❌ History listing failed for {} (page {}): {}", token, summary.pages + 1, e);
                    summary.status = failed(e);
                    break;
                }
            };

            let oldest = match page.last() {
                Some(reference) => reference.clone(),
                None => {
                    debug!("History of {} exhausted after {} pages", token, summary.pages);
                    break;
                }
            };

            summary.pages += 1;
            summary.references_seen += page.len() as u64;

            let in_window: Vec<&TransactionReference> = page
                .iter()
                .filter(|reference| window.contains(reference.block_time_or_epoch()))
                .collect();
            summary.references_in_window += in_window.len() as u64;

            debug!(
                "📄 {} page {}: {} references, {} in window",
                token,
                summary.pages,
                page.len(),
                in_window.len()
            );

            if let Some(status) = self
                .process_page(token, &in_window, cancel, &mut summary, &mut on_trade)
                .await
            {
                summary.status = status;
                break;
            }

            // Next page starts below the raw page boundary, not the last match
            cursor = Some(oldest.signature.clone());

            if window.is_before_start(oldest.block_time_or_epoch()) {
                debug!(
                    "Oldest reference {} of {} predates the window, stopping",
                    oldest.signature, token
                );
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.status = ScanStatus::Cancelled;
                    break;
                }
                _ = tokio::time::sleep(self.settings.throttle) => {}
            }
        }

        match &summary.status {
            ScanStatus::Cancelled => warn!("⏹️ Scan of {} cancelled after {} pages", token, summary.pages),
            ScanStatus::Failed { .. } => {}
            _ => info!(
                "✅ Scanned {}: {} pages, {} in window, {} balance changes, {} decode skips",
                token,
                summary.pages,
                summary.references_in_window,
                summary.balance_changes,
                summary.decode_skips
            ),
        }

        summary
    }

    /// Fetch and inspect the in-window references of one page, in page order.
    /// Returns the terminal status when the scan must stop.
    async fn process_page<F>(
        &self,
        token: &str,
        references: &[&TransactionReference],
        cancel: &CancellationToken,
        summary: &mut ScanSummary,
        on_trade: &mut F,
    ) -> Option<ScanStatus>
    where
        F: FnMut(TradeRecord) + Send,
    {
        let fetches: Vec<_> = references
            .iter()
            .map(|reference| {
                let signature = reference.signature.as_str();
                async move { (signature, self.fetch_detail(signature, cancel).await) }
            })
            .collect();
        let mut details = stream::iter(fetches).buffered(self.settings.detail_concurrency);

        while let Some((signature, outcome)) = details.next().await {
            let fetched = match outcome {
                DetailOutcome::Cancelled => return Some(ScanStatus::Cancelled),
                DetailOutcome::Fetched(fetched) => fetched,
            };

            let detail = match fetched {
                Ok(Some(detail)) => detail,
                Ok(None) => {
                    debug!("Transaction {} not available, skipping", signature);
                    summary.decode_skips += 1;
                    continue;
                }
                Err(e) if e.is_decode() => {
                    warn!("⚠️ Skipping undecodable transaction {}: {}", signature, e);
                    summary.decode_skips += 1;
                    continue;
                }
                Err(e) => {
                    warn!(
                        "❌ Fetching {} failed while scanning {}: {}",
                        signature, token, e
                    );
                    return Some(failed(e));
                }
            };

            match self.detector.detect_trades(&detail, token) {
                Ok(trades) => {
                    summary.transactions_decoded += 1;
                    for trade in trades {
                        summary.balance_changes += 1;
                        on_trade(trade);
                    }
                }
                Err(e) => {
                    debug!("Skipping {}: {}", signature, e);
                    summary.decode_skips += 1;
                }
            }
        }

        None
    }

    async fn fetch_detail(&self, signature: &str, cancel: &CancellationToken) -> DetailOutcome {
        if cancel.is_cancelled() {
            return DetailOutcome::Cancelled;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => DetailOutcome::Cancelled,
            fetched = self.ledger.fetch_detail(signature) => DetailOutcome::Fetched(fetched),
        }
    }
}

fn failed(error: LedgerError) -> ScanStatus {
    ScanStatus::Failed {
        reason: error.to_string(),
    }
}
