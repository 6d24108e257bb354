//! Ledger records as the scanner sees them, plus the raw JSON-RPC shapes they are decoded from.

use crate::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// One entry of getSignaturesForAddress, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReference {
    pub signature: String,
    #[serde(default)]
    pub slot: u64,
    pub block_time: Option<i64>,
}

impl TransactionReference {
    pub fn new(signature: impl Into<String>, block_time: Option<i64>) -> Self {
        Self {
            signature: signature.into(),
            slot: 0,
            block_time,
        }
    }

    /// Block time with the missing case mapped to epoch 0
    pub fn block_time_or_epoch(&self) -> i64 {
        self.block_time.unwrap_or(0)
    }
}

/// SPL token balance snapshot for one token account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub mint: String,
    pub owner: Option<String>,
    pub ui_amount: Decimal,
}

impl TokenBalance {
    pub fn new(mint: impl Into<String>, owner: impl Into<String>, ui_amount: Decimal) -> Self {
        Self {
            mint: mint.into(),
            owner: Some(owner.into()),
            ui_amount,
        }
    }
}

/// Status metadata of a confirmed transaction
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransactionMeta {
    pub failed: bool,
    /// Lamports
    pub fee: u64,
    /// Lamports per account, indexed like `account_keys`
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
    pub pre_token_balances: Option<Vec<TokenBalance>>,
    pub post_token_balances: Option<Vec<TokenBalance>>,
}

/// Fully materialized transaction as returned by getTransaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDetail {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    /// Static account keys of the message, program ids included
    pub account_keys: Vec<String>,
    pub meta: Option<TransactionMeta>,
}

/// Solana RPC response envelope
#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    pub jsonrpc: String,
    pub id: u64,
    pub result: Option<T>,
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTransaction {
    #[serde(default)]
    slot: u64,
    block_time: Option<i64>,
    meta: Option<RawMeta>,
    transaction: RawEnvelope,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    #[serde(default)]
    signatures: Vec<String>,
    message: RawMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    account_keys: Vec<RawAccountKey>,
}

/// `json` encoding yields plain strings, `jsonParsed` yields objects
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAccountKey {
    Plain(String),
    Parsed { pubkey: String },
}

impl RawAccountKey {
    fn into_pubkey(self) -> String {
        match self {
            RawAccountKey::Plain(key) => key,
            RawAccountKey::Parsed { pubkey } => pubkey,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMeta {
    err: Option<Value>,
    #[serde(default)]
    fee: u64,
    #[serde(default)]
    pre_balances: Vec<u64>,
    #[serde(default)]
    post_balances: Vec<u64>,
    pre_token_balances: Option<Vec<RawTokenBalance>>,
    post_token_balances: Option<Vec<RawTokenBalance>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTokenBalance {
    mint: String,
    owner: Option<String>,
    ui_token_amount: RawUiTokenAmount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUiTokenAmount {
    amount: Option<String>,
    decimals: Option<u32>,
    ui_amount: Option<f64>,
    ui_amount_string: Option<String>,
}

impl RawUiTokenAmount {
    /// Exact decimal from the string forms, falling back to the lossy float
    fn to_decimal(&self) -> Decimal {
        if let Some(s) = &self.ui_amount_string {
            if let Ok(d) = Decimal::from_str(s) {
                return d;
            }
        }

        if let (Some(raw), Some(decimals)) = (&self.amount, self.decimals) {
            if decimals <= 28 {
                if let Ok(units) = raw.parse::<i128>() {
                    if let Ok(d) = Decimal::try_from_i128_with_scale(units, decimals) {
                        return d.normalize();
                    }
                }
            }
        }

        self.ui_amount
            .and_then(|f| Decimal::try_from(f).ok())
            .unwrap_or(Decimal::ZERO)
    }
}

impl RawTokenBalance {
    fn into_balance(self) -> TokenBalance {
        let ui_amount = self.ui_token_amount.to_decimal();
        TokenBalance {
            mint: self.mint,
            owner: self.owner,
            ui_amount,
        }
    }
}

impl RawTransaction {
    pub(crate) fn into_detail(self, requested_signature: &str) -> Result<TransactionDetail, LedgerError> {
        let account_keys: Vec<String> = self
            .transaction
            .message
            .account_keys
            .into_iter()
            .map(RawAccountKey::into_pubkey)
            .collect();

        if account_keys.is_empty() {
            return Err(LedgerError::Decode {
                signature: requested_signature.to_string(),
                reason: "message has no account keys".to_string(),
            });
        }

        let signature = self
            .transaction
            .signatures
            .into_iter()
            .next()
            .unwrap_or_else(|| requested_signature.to_string());

        let meta = self.meta.map(|m| TransactionMeta {
            failed: m.err.map(|e| !e.is_null()).unwrap_or(false),
            fee: m.fee,
            pre_balances: m.pre_balances,
            post_balances: m.post_balances,
            pre_token_balances: m
                .pre_token_balances
                .map(|v| v.into_iter().map(RawTokenBalance::into_balance).collect()),
            post_token_balances: m
                .post_token_balances
                .map(|v| v.into_iter().map(RawTokenBalance::into_balance).collect()),
        });

        Ok(TransactionDetail {
            signature,
            slot: self.slot,
            block_time: self.block_time,
            account_keys,
            meta,
        })
    }
}

/// Decode a getTransaction `result` value
pub fn decode_transaction(signature: &str, value: Value) -> Result<TransactionDetail, LedgerError> {
    let raw: RawTransaction = serde_json::from_value(value).map_err(|e| LedgerError::Decode {
        signature: signature.to_string(),
        reason: e.to_string(),
    })?;
    raw.into_detail(signature)
}
