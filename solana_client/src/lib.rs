// Solana ledger access: the LedgerClient seam used by the history scanner and its JSON-RPC implementation

pub mod types;

pub use types::{
    decode_transaction, RpcError, RpcResponse, TokenBalance, TransactionDetail, TransactionMeta,
    TransactionReference,
};

use async_trait::async_trait;
use reqwest::Client;
use retry_utils::{retry_with_backoff, BackoffPolicy, FailureClass};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::debug;

/// Node is behind or unhealthy, worth retrying
const RPC_NODE_UNHEALTHY: i64 = -32005;

/// getTransaction error codes that concern one transaction rather than the node:
/// block not available, slot skipped, missing in long-term storage,
/// history not available, unsupported transaction version
const RPC_UNREADABLE_TRANSACTION: [i64; 5] = [-32004, -32007, -32009, -32011, -32015];

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Ledger node unavailable: {0}")]
    Unavailable(String),
    #[error("Undecodable transaction {signature}: {reason}")]
    Decode { signature: String, reason: String },
}

impl LedgerError {
    /// A single transaction could not be read; the scan can move on
    pub fn is_decode(&self) -> bool {
        matches!(self, LedgerError::Decode { .. })
    }

    /// Rewrite an RPC error about a single transaction as a decode failure,
    /// leaving node and transport failures untouched
    pub fn for_transaction(self, signature: &str) -> LedgerError {
        match self {
            LedgerError::Rpc { code, message } if RPC_UNREADABLE_TRANSACTION.contains(&code) => {
                LedgerError::Decode {
                    signature: signature.to_string(),
                    reason: format!("RPC error {}: {}", code, message),
                }
            }
            other => other,
        }
    }

    pub fn failure_class(&self) -> FailureClass {
        match self {
            LedgerError::Status(429) => FailureClass::RateLimited,
            LedgerError::Status(code) if *code >= 500 => FailureClass::Transient,
            LedgerError::Http(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                FailureClass::Transient
            }
            LedgerError::Rpc { code, .. } if *code == RPC_NODE_UNHEALTHY => FailureClass::Transient,
            LedgerError::Unavailable(_) => FailureClass::Transient,
            _ => FailureClass::Permanent,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Read-only view of a ledger node used by the history scanner.
///
/// `list_references` returns at most `limit` references touching `address`, newest first,
/// strictly older than `before` when given, and an empty page once history is exhausted.
/// `fetch_detail` returns `Ok(None)` when the node has no such transaction.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn list_references(
        &self,
        address: &str,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TransactionReference>>;

    async fn fetch_detail(&self, signature: &str) -> Result<Option<TransactionDetail>>;
}

#[derive(Debug, Clone)]
pub struct SolanaClientConfig {
    pub rpc_url: String,
    /// Request timeout in seconds
    pub rpc_timeout_seconds: u64,
    /// Max in-flight requests shared by every clone of the client
    pub max_concurrent_requests: usize,
    pub backoff: BackoffPolicy,
}

impl Default for SolanaClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            rpc_timeout_seconds: 30,
            max_concurrent_requests: 5,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// JSON-RPC ledger client
#[derive(Clone)]
pub struct SolanaRpcClient {
    config: SolanaClientConfig,
    http_client: Client,
    limiter: Arc<Semaphore>,
    request_id_counter: Arc<AtomicU64>,
}

impl SolanaRpcClient {
    pub fn new(config: SolanaClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.rpc_timeout_seconds))
            .build()?;

        let limiter = Arc::new(Semaphore::new(config.max_concurrent_requests.max(1)));

        Ok(Self {
            config,
            http_client,
            limiter,
            request_id_counter: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.config.rpc_url
    }

    fn next_request_id(&self) -> u64 {
        self.request_id_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// RPC call with classified retries
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        retry_with_backoff(
            || self.send_once(method, params.clone()),
            &self.config.backoff,
            LedgerError::failure_class,
        )
        .await
    }

    async fn send_once(&self, method: &str, params: Value) -> Result<Value> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| LedgerError::Unavailable("request limiter closed".to_string()))?;

        let request_body = json!({
            "jsonrpc": "2.0",
            "id": self.next_request_id(),
            "method": method,
            "params": params
        });

        let response = self
            .http_client
            .post(&self.config.rpc_url)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Status(status.as_u16()));
        }

        let rpc_response: RpcResponse<Value> = response.json().await?;

        if let Some(error) = rpc_response.error {
            return Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(rpc_response.result.unwrap_or(Value::Null))
    }
}

/// Params for getSignaturesForAddress
pub fn signatures_params(address: &str, before: Option<&str>, limit: usize) -> Value {
    let mut options = serde_json::Map::new();
    options.insert("limit".to_string(), json!(limit));
    if let Some(before_sig) = before {
        options.insert("before".to_string(), json!(before_sig));
    }
    json!([address, options])
}

/// Params for getTransaction, accepting versioned transactions
pub fn transaction_params(signature: &str) -> Value {
    json!([
        signature,
        {
            "encoding": "json",
            "maxSupportedTransactionVersion": 0
        }
    ])
}

#[async_trait]
impl LedgerClient for SolanaRpcClient {
    async fn list_references(
        &self,
        address: &str,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TransactionReference>> {
        let result = self
            .call("getSignaturesForAddress", signatures_params(address, before, limit))
            .await?;

        if result.is_null() {
            return Ok(vec![]);
        }

        let references: Vec<TransactionReference> = serde_json::from_value(result)?;
        debug!(
            "getSignaturesForAddress {} before={:?} -> {} references",
            address,
            before,
            references.len()
        );
        Ok(references)
    }

    async fn fetch_detail(&self, signature: &str) -> Result<Option<TransactionDetail>> {
        let result = self
            .call("getTransaction", transaction_params(signature))
            .await
            .map_err(|e| e.for_transaction(signature))?;

        if result.is_null() {
            debug!("No transaction data returned for: {}", signature);
            return Ok(None);
        }

        decode_transaction(signature, result).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_solana_client_creation() {
        let client = SolanaRpcClient::new(SolanaClientConfig::default()).unwrap();
        assert_eq!(client.rpc_url(), "https://api.mainnet-beta.solana.com");
    }

    #[test]
    fn test_signatures_params_without_cursor() {
        let params = signatures_params("Mint111", None, 1000);
        assert_eq!(params[0], "Mint111");
        assert_eq!(params[1]["limit"], 1000);
        assert!(params[1].get("before").is_none());
    }

    #[test]
    fn test_signatures_params_with_cursor() {
        let params = signatures_params("Mint111", Some("SigOld"), 50);
        assert_eq!(params[1]["before"], "SigOld");
        assert_eq!(params[1]["limit"], 50);
    }

    #[test]
    fn test_transaction_params_accept_versioned() {
        let params = transaction_params("Sig");
        assert_eq!(params[1]["maxSupportedTransactionVersion"], 0);
        assert_eq!(params[1]["encoding"], "json");
    }

    #[test]
    fn test_failure_classification() {
        assert_eq!(LedgerError::Status(429).failure_class(), FailureClass::RateLimited);
        assert_eq!(LedgerError::Status(502).failure_class(), FailureClass::Transient);
        assert_eq!(LedgerError::Status(400).failure_class(), FailureClass::Permanent);
        assert_eq!(
            LedgerError::Rpc { code: -32005, message: "behind".to_string() }.failure_class(),
            FailureClass::Transient
        );
        assert_eq!(
            LedgerError::Rpc { code: -32602, message: "invalid params".to_string() }
                .failure_class(),
            FailureClass::Permanent
        );
    }

    #[test]
    fn test_decode_vs_transport() {
        let decode = LedgerError::Decode {
            signature: "S".to_string(),
            reason: "bad".to_string(),
        };
        assert!(decode.is_decode());
        assert!(!LedgerError::Status(503).is_decode());
    }

    #[test]
    fn test_per_transaction_rpc_errors_become_decode() {
        for code in [-32004, -32007, -32009, -32011, -32015] {
            let err = LedgerError::Rpc {
                code,
                message: "Transaction version (1) is not supported".to_string(),
            }
            .for_transaction("SigV1");
            assert!(err.is_decode(), "code {} should skip one transaction", code);
            assert!(err.to_string().contains("SigV1"));
        }
    }

    #[test]
    fn test_node_failures_stay_transport() {
        let behind = LedgerError::Rpc {
            code: RPC_NODE_UNHEALTHY,
            message: "Node is behind".to_string(),
        }
        .for_transaction("Sig");
        assert!(!behind.is_decode());
        assert!(!LedgerError::Status(503).for_transaction("Sig").is_decode());
        assert!(!LedgerError::Unavailable("reset".to_string())
            .for_transaction("Sig")
            .is_decode());
    }
}
