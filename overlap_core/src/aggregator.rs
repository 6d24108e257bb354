use crate::{BalanceChange, TradeRecord};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Tracks which distinct tokens each wallet changed holdings in during one run.
///
/// Additive only: `record` never removes anything and `result` is a pure query.
/// Callers scanning tokens concurrently wrap it in a mutex.
#[derive(Debug, Default)]
pub struct OverlapAggregator {
    tokens_by_wallet: HashMap<String, HashSet<String>>,
    retain_trades: bool,
    trades: Vec<TradeRecord>,
}

impl OverlapAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also keep every trade record for export
    pub fn with_trade_retention() -> Self {
        Self {
            retain_trades: true,
            ..Self::default()
        }
    }

    pub fn record(&mut self, change: BalanceChange) {
        let tokens = self.tokens_by_wallet.entry(change.wallet).or_default();
        tokens.insert(change.token);
    }

    pub fn record_trade(&mut self, trade: TradeRecord) {
        self.record(trade.balance_change());
        if self.retain_trades {
            self.trades.push(trade);
        }
    }

    /// Wallets with two or more distinct tokens, sorted
    pub fn result(&self) -> Vec<String> {
        let wallets: BTreeSet<&String> = self
            .tokens_by_wallet
            .iter()
            .filter(|(_, tokens)| tokens.len() > 1)
            .map(|(wallet, _)| wallet)
            .collect();

        debug!(
            "{} of {} wallets traded more than one token",
            wallets.len(),
            self.tokens_by_wallet.len()
        );

        wallets.into_iter().cloned().collect()
    }

    /// Retained trades of overlap wallets, in recording order
    pub fn overlap_trades(&self) -> Vec<TradeRecord> {
        self.trades
            .iter()
            .filter(|t| {
                self.tokens_by_wallet
                    .get(&t.wallet)
                    .map_or(false, |tokens| tokens.len() > 1)
            })
            .cloned()
            .collect()
    }

    /// Distinct wallets seen so far, overlapping or not
    pub fn wallet_count(&self) -> usize {
        self.tokens_by_wallet.len()
    }
}
