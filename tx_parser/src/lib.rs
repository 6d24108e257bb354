// Swap detection: decides whether a transaction touched a known DEX program and
// extracts per-wallet balance deltas for one token mint

pub mod dex_programs;
pub mod profit;

pub use dex_programs::{DexProgramSet, KNOWN_DEX_PROGRAMS};
pub use profit::{estimate_native_profit, LAMPORTS_PER_SOL};

use overlap_core::{BalanceChange, TradeRecord, TradeSide};
use rust_decimal::Decimal;
use solana_client::{TokenBalance, TransactionDetail};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Transaction {signature} is missing {what}")]
    MissingData { signature: String, what: &'static str },
}

pub type Result<T> = std::result::Result<T, ParseError>;

pub struct SwapDetector {
    programs: DexProgramSet,
}

impl Default for SwapDetector {
    fn default() -> Self {
        Self::new(DexProgramSet::default())
    }
}

impl SwapDetector {
    pub fn new(programs: DexProgramSet) -> Self {
        Self { programs }
    }

    /// Wallets whose holdings of `target_token` changed in a swap transaction.
    /// Unreadable details yield no changes.
    pub fn detect(&self, detail: &TransactionDetail, target_token: &str) -> Vec<BalanceChange> {
        self.detect_trades(detail, target_token)
            .unwrap_or_default()
            .iter()
            .map(TradeRecord::balance_change)
            .collect()
    }

    /// Like `detect`, but with direction, size and the native profit estimate.
    ///
    /// `Err` means the detail lacks balance metadata or an account list;
    /// `Ok(vec![])` means it was readable but not a swap or nothing changed.
    pub fn detect_trades(
        &self,
        detail: &TransactionDetail,
        target_token: &str,
    ) -> Result<Vec<TradeRecord>> {
        let missing = |what: &'static str| ParseError::MissingData {
            signature: detail.signature.clone(),
            what,
        };

        let meta = detail.meta.as_ref().ok_or_else(|| missing("meta"))?;

        if detail.account_keys.is_empty() {
            return Err(missing("account keys"));
        }

        let (pre_balances, post_balances) =
            match (&meta.pre_token_balances, &meta.post_token_balances) {
                (Some(pre), Some(post)) => (pre, post),
                _ => return Err(missing("token balances")),
            };

        let program = match self.programs.find_in(&detail.account_keys) {
            Some(name) => name,
            None => {
                trace!("{} touches no known DEX program", detail.signature);
                return Ok(vec![]);
            }
        };

        let pre_map: HashMap<&str, Decimal> = owner_amounts(pre_balances, target_token).collect();
        // Sorted by owner so emitted order is stable
        let post_map: BTreeMap<&str, Decimal> = owner_amounts(post_balances, target_token).collect();

        let profit_sol = estimate_native_profit(meta);

        let trades: Vec<TradeRecord> = post_map
            .into_iter()
            .filter_map(|(wallet, post_amount)| {
                let pre_amount = pre_map.get(wallet).copied().unwrap_or(Decimal::ZERO);
                let diff = post_amount - pre_amount;
                if diff.is_zero() {
                    return None;
                }

                Some(TradeRecord {
                    wallet: wallet.to_string(),
                    token: target_token.to_string(),
                    signature: detail.signature.clone(),
                    block_time: detail.block_time,
                    side: if diff.is_sign_negative() {
                        TradeSide::Sell
                    } else {
                        TradeSide::Buy
                    },
                    amount: diff.abs(),
                    profit_sol,
                })
            })
            .collect();

        if meta.failed && !trades.is_empty() {
            debug!(
                "{} failed on chain yet shows {} balance changes for {}",
                detail.signature,
                trades.len(),
                target_token
            );
        }

        debug!(
            "🔍 {} via {}: {} balance changes for {}",
            detail.signature,
            program,
            trades.len(),
            target_token
        );

        Ok(trades)
    }
}

/// Owner -> UI amount for entries of `mint`; later entries overwrite earlier ones
fn owner_amounts<'a>(
    balances: &'a [TokenBalance],
    mint: &'a str,
) -> impl Iterator<Item = (&'a str, Decimal)> + 'a {
    balances
        .iter()
        .filter(move |b| b.mint == mint)
        .filter_map(|b| b.owner.as_deref().map(|owner| (owner, b.ui_amount)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_client::TransactionMeta;
    use std::str::FromStr;

    const RAYDIUM: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn detail(
        account_keys: &[&str],
        pre: Vec<TokenBalance>,
        post: Vec<TokenBalance>,
    ) -> TransactionDetail {
        TransactionDetail {
            signature: "sig".to_string(),
            slot: 1,
            block_time: Some(1_700_000_000),
            account_keys: account_keys.iter().map(|k| k.to_string()).collect(),
            meta: Some(TransactionMeta {
                failed: false,
                fee: 5_000,
                pre_balances: vec![1_000_000_000, 0],
                post_balances: vec![999_995_000, 0],
                pre_token_balances: Some(pre),
                post_token_balances: Some(post),
            }),
        }
    }

    #[test]
    fn test_buy_detected_with_exchange_program() {
        let tx = detail(
            &["A", RAYDIUM],
            vec![TokenBalance::new("T", "A", dec("5"))],
            vec![TokenBalance::new("T", "A", dec("8"))],
        );

        let changes = SwapDetector::default().detect(&tx, "T");
        assert_eq!(
            changes,
            vec![BalanceChange {
                wallet: "A".to_string(),
                token: "T".to_string()
            }]
        );

        let trades = SwapDetector::default().detect_trades(&tx, "T").unwrap();
        assert_eq!(trades[0].side, TradeSide::Buy);
        assert_eq!(trades[0].amount, dec("3"));
        assert_eq!(trades[0].profit_sol, Decimal::ZERO);
    }

    #[test]
    fn test_no_exchange_program_means_no_changes() {
        let tx = detail(
            &["A", "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"],
            vec![TokenBalance::new("T", "A", dec("5"))],
            vec![TokenBalance::new("T", "A", dec("8"))],
        );

        assert!(SwapDetector::default().detect(&tx, "T").is_empty());
        assert_eq!(SwapDetector::default().detect_trades(&tx, "T"), Ok(vec![]));
    }

    #[test]
    fn test_sell_and_new_holder() {
        let tx = detail(
            &[RAYDIUM],
            vec![
                TokenBalance::new("T", "Seller", dec("10")),
                TokenBalance::new("Other", "Buyer", dec("99")),
            ],
            vec![
                TokenBalance::new("T", "Seller", dec("4.5")),
                TokenBalance::new("T", "Buyer", dec("5.5")),
            ],
        );

        let trades = SwapDetector::default().detect_trades(&tx, "T").unwrap();
        assert_eq!(trades.len(), 2);
        // BTreeMap order: Buyer < Seller
        assert_eq!(trades[0].wallet, "Buyer");
        assert_eq!(trades[0].side, TradeSide::Buy);
        assert_eq!(trades[0].amount, dec("5.5"));
        assert_eq!(trades[1].wallet, "Seller");
        assert_eq!(trades[1].side, TradeSide::Sell);
        assert_eq!(trades[1].amount, dec("5.5"));
    }

    #[test]
    fn test_unchanged_balance_and_other_mints_ignored() {
        let tx = detail(
            &[RAYDIUM],
            vec![
                TokenBalance::new("T", "A", dec("1")),
                TokenBalance::new("U", "B", dec("1")),
            ],
            vec![
                TokenBalance::new("T", "A", dec("1.0")),
                TokenBalance::new("U", "B", dec("2")),
            ],
        );

        assert!(SwapDetector::default().detect(&tx, "T").is_empty());
    }

    #[test]
    fn test_repeated_owner_last_write_wins() {
        let tx = detail(
            &[RAYDIUM],
            vec![TokenBalance::new("T", "A", dec("2"))],
            vec![
                TokenBalance::new("T", "A", dec("7")),
                TokenBalance::new("T", "A", dec("2")),
            ],
        );

        assert!(SwapDetector::default().detect(&tx, "T").is_empty());
    }

    #[test]
    fn test_owner_missing_from_post_is_not_reported() {
        let tx = detail(
            &[RAYDIUM],
            vec![TokenBalance::new("T", "A", dec("3"))],
            vec![],
        );

        assert!(SwapDetector::default().detect(&tx, "T").is_empty());
    }

    #[test]
    fn test_missing_metadata_rejected() {
        let mut tx = detail(&[RAYDIUM], vec![], vec![]);
        tx.meta = None;
        assert!(SwapDetector::default().detect(&tx, "T").is_empty());
        assert!(matches!(
            SwapDetector::default().detect_trades(&tx, "T"),
            Err(ParseError::MissingData { what: "meta", .. })
        ));

        let mut tx = detail(&[RAYDIUM], vec![], vec![]);
        if let Some(meta) = tx.meta.as_mut() {
            meta.post_token_balances = None;
        }
        assert!(SwapDetector::default().detect_trades(&tx, "T").is_err());

        let tx = detail(&[], vec![], vec![]);
        assert!(matches!(
            SwapDetector::default().detect_trades(&tx, "T"),
            Err(ParseError::MissingData { what: "account keys", .. })
        ));
    }

    #[test]
    fn test_failed_transaction_judged_by_balances() {
        let mut reverted = detail(
            &["A", RAYDIUM],
            vec![TokenBalance::new("T", "A", dec("5"))],
            vec![TokenBalance::new("T", "A", dec("5"))],
        );
        if let Some(meta) = reverted.meta.as_mut() {
            meta.failed = true;
        }
        assert!(SwapDetector::default().detect(&reverted, "T").is_empty());

        let mut moved = detail(
            &["A", RAYDIUM],
            vec![TokenBalance::new("T", "A", dec("5"))],
            vec![TokenBalance::new("T", "A", dec("2"))],
        );
        if let Some(meta) = moved.meta.as_mut() {
            meta.failed = true;
        }
        assert_eq!(SwapDetector::default().detect(&moved, "T").len(), 1);
    }

    #[test]
    fn test_configured_program_table() {
        let custom = "CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK";
        let tx = detail(
            &["A", custom],
            vec![TokenBalance::new("T", "A", dec("0"))],
            vec![TokenBalance::new("T", "A", dec("1"))],
        );

        assert!(SwapDetector::default().detect(&tx, "T").is_empty());
        let detector = SwapDetector::new(DexProgramSet::from_ids([custom]));
        assert_eq!(detector.detect(&tx, "T").len(), 1);
    }
}
