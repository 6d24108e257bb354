pub mod aggregator;
pub mod entries;
pub mod export;
pub mod timeframe;

pub use aggregator::OverlapAggregator;
pub use entries::read_entries_csv;
pub use export::{trades_csv_string, write_trades_csv, write_wallets_csv};
pub use timeframe::{parse_time_input, TimeWindow};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid token address: {0}")]
    InvalidAddress(String),
    #[error("Start time {start_ms} is after end time {end_ms} for token {token}")]
    InvertedWindow {
        token: String,
        start_ms: i64,
        end_ms: i64,
    },
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("Invalid entry on line {line}: {reason}")]
    InvalidEntry { line: u64, reason: String },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Parse a base58 account address
pub fn parse_address(address: &str) -> Result<Pubkey> {
    Pubkey::from_str(address.trim()).map_err(|_| CoreError::InvalidAddress(address.to_string()))
}

/// Caller-facing entry shape: token plus millisecond window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEntryInput {
    pub token: String,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
}

/// One token to scan and the window its trades must fall in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    pub window: TimeWindow,
}

impl TokenEntry {
    /// Build from caller millisecond timestamps; an inverted window is an input-shape error
    pub fn from_millis(token: impl Into<String>, start_ms: i64, end_ms: i64) -> Result<Self> {
        let token = token.into().trim().to_string();
        let window = TimeWindow::from_millis(start_ms, end_ms).map_err(|_| {
            CoreError::InvertedWindow {
                token: token.clone(),
                start_ms,
                end_ms,
            }
        })?;
        Ok(Self { token, window })
    }

    /// Address check done at scan time; failures skip the entry
    pub fn mint(&self) -> Result<Pubkey> {
        parse_address(&self.token)
    }
}

impl TryFrom<TokenEntryInput> for TokenEntry {
    type Error = CoreError;

    fn try_from(input: TokenEntryInput) -> Result<Self> {
        TokenEntry::from_millis(input.token, input.start_timestamp, input.end_timestamp)
    }
}

/// A wallet's holdings of `token` changed inside a swap transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BalanceChange {
    pub wallet: String,
    pub token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Balance change widened with the trade detail used for export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub wallet: String,
    pub token: String,
    pub signature: String,
    pub block_time: Option<i64>,
    pub side: TradeSide,
    /// Absolute token delta in UI units
    pub amount: Decimal,
    /// Net native change of the whole transaction plus fee, in SOL (4 dp)
    pub profit_sol: Decimal,
}

impl TradeRecord {
    pub fn balance_change(&self) -> BalanceChange {
        BalanceChange {
            wallet: self.wallet.clone(),
            token: self.token.clone(),
        }
    }
}

/// How a token's scan ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanStatus {
    Completed,
    /// Entry never scanned (malformed address)
    Skipped { reason: String },
    /// Ledger failure mid-scan; changes found before it are kept
    Failed { reason: String },
    Cancelled,
}

/// Per-token counters so "skipped" and "no matches" stay distinguishable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub token: String,
    #[serde(flatten)]
    pub status: ScanStatus,
    pub pages: u32,
    pub references_seen: u64,
    pub references_in_window: u64,
    pub transactions_decoded: u64,
    pub decode_skips: u64,
    pub balance_changes: u64,
}

impl ScanSummary {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            status: ScanStatus::Completed,
            pages: 0,
            references_seen: 0,
            references_in_window: 0,
            transactions_decoded: 0,
            decode_skips: 0,
            balance_changes: 0,
        }
    }

    pub fn skipped(token: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut summary = Self::new(token);
        summary.status = ScanStatus::Skipped {
            reason: reason.into(),
        };
        summary
    }

    pub fn is_complete(&self) -> bool {
        self.status == ScanStatus::Completed
    }
}

/// Outcome of one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Wallets that changed holdings in two or more distinct tokens
    pub wallets: Vec<String>,
    /// Trade records of those wallets, empty unless retention was requested
    pub trades: Vec<TradeRecord>,
    pub scans: Vec<ScanSummary>,
}

impl AnalysisReport {
    /// True when some token was skipped, failed or cancelled
    pub fn is_partial(&self) -> bool {
        self.scans.iter().any(|s| !s.is_complete())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    #[test]
    fn test_parse_address() {
        assert!(parse_address(USDC).is_ok());
        assert!(parse_address(" EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v ").is_ok());
        assert!(matches!(
            parse_address("not-a-mint"),
            Err(CoreError::InvalidAddress(_))
        ));
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_entry_from_millis() {
        let entry = TokenEntry::from_millis(USDC, 1_700_000_000_000, 1_700_086_400_000).unwrap();
        assert_eq!(entry.window.start, 1_700_000_000);
        assert_eq!(entry.window.end, 1_700_086_400);
        assert!(entry.mint().is_ok());
    }

    #[test]
    fn test_inverted_window_rejected() {
        let err = TokenEntry::from_millis(USDC, 2_000, 1_000).unwrap_err();
        assert!(matches!(err, CoreError::InvertedWindow { .. }));
    }

    #[test]
    fn test_entry_input_camel_case() {
        let input: TokenEntryInput = serde_json::from_str(
            r#"{"token":"T1","startTimestamp":1000,"endTimestamp":5000}"#,
        )
        .unwrap();
        let entry = TokenEntry::try_from(input).unwrap();
        assert_eq!(entry.token, "T1");
        assert_eq!(entry.window.start, 1);
        assert_eq!(entry.window.end, 5);
        // malformed address is not an input-shape error
        assert!(entry.mint().is_err());
    }

    #[test]
    fn test_trade_side_display() {
        assert_eq!(TradeSide::Buy.to_string(), "BUY");
        assert_eq!(TradeSide::Sell.to_string(), "SELL");
        assert_eq!(serde_json::to_string(&TradeSide::Sell).unwrap(), "\"SELL\"");
    }

    #[test]
    fn test_scan_summary_serialization() {
        let summary = ScanSummary::skipped("bad", "Invalid token address: bad");
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["status"], "skipped");
        assert_eq!(value["reason"], "Invalid token address: bad");
        assert!(!summary.is_complete());
    }
}
