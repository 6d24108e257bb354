//! In-memory ledger for driving the scanner and engine without a node.

#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use solana_client::{
    LedgerClient, LedgerError, Result, TokenBalance, TransactionDetail, TransactionMeta,
    TransactionReference,
};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const RAYDIUM: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";
pub const TOKEN_ONE: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const TOKEN_TWO: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";
pub const TOKEN_THREE: &str = "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN";

#[derive(Default)]
pub struct SimulatedLedger {
    /// Newest first per address
    histories: HashMap<String, Vec<TransactionReference>>,
    details: HashMap<String, TransactionDetail>,
    undecodable: HashSet<String>,
    failing_addresses: HashSet<String>,
    failing_signatures: HashSet<String>,
    rpc_errors: HashMap<String, i64>,
    list_calls: AtomicUsize,
    detail_calls: AtomicUsize,
    cursors: Mutex<Vec<(String, Option<String>)>>,
    fetched: Mutex<Vec<String>>,
}

impl SimulatedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A swap where `wallet` moves from `pre` to `post` units of `token`
    pub fn with_swap(
        mut self,
        token: &str,
        signature: &str,
        block_time: i64,
        wallet: &str,
        pre: i64,
        post: i64,
    ) -> Self {
        self.push_reference(token, signature, Some(block_time));
        self.details.insert(
            signature.to_string(),
            TransactionDetail {
                signature: signature.to_string(),
                slot: block_time as u64,
                block_time: Some(block_time),
                account_keys: vec![wallet.to_string(), RAYDIUM.to_string()],
                meta: Some(TransactionMeta {
                    failed: false,
                    fee: 5_000,
                    pre_balances: vec![1_000_000_000, 1],
                    post_balances: vec![999_995_000, 1],
                    pre_token_balances: Some(vec![TokenBalance::new(
                        token,
                        wallet,
                        Decimal::from(pre),
                    )]),
                    post_token_balances: Some(vec![TokenBalance::new(
                        token,
                        wallet,
                        Decimal::from(post),
                    )]),
                }),
            },
        );
        self
    }

    /// A reference the node lists but cannot return a detail for
    pub fn with_reference(mut self, token: &str, signature: &str, block_time: Option<i64>) -> Self {
        self.push_reference(token, signature, block_time);
        self
    }

    pub fn with_undecodable(mut self, token: &str, signature: &str, block_time: i64) -> Self {
        self.push_reference(token, signature, Some(block_time));
        self.undecodable.insert(signature.to_string());
        self
    }

    /// The node answers getTransaction for `signature` with a JSON-RPC error object
    pub fn with_rpc_error(mut self, token: &str, signature: &str, block_time: i64, code: i64) -> Self {
        self.push_reference(token, signature, Some(block_time));
        self.rpc_errors.insert(signature.to_string(), code);
        self
    }

    pub fn failing_history(mut self, token: &str) -> Self {
        self.failing_addresses.insert(token.to_string());
        self
    }

    pub fn failing_detail(mut self, signature: &str) -> Self {
        self.failing_signatures.insert(signature.to_string());
        self
    }

    fn push_reference(&mut self, token: &str, signature: &str, block_time: Option<i64>) {
        let history = self.histories.entry(token.to_string()).or_default();
        history.push(TransactionReference::new(signature, block_time));
        history.sort_by_key(|r| Reverse(r.block_time_or_epoch()));
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    /// `(address, before)` of every listing request, in order
    pub fn cursors(&self) -> Vec<(String, Option<String>)> {
        self.cursors.lock().unwrap().clone()
    }

    /// Signatures passed to `fetch_detail`, in request order
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerClient for SimulatedLedger {
    async fn list_references(
        &self,
        address: &str,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TransactionReference>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.cursors
            .lock()
            .unwrap()
            .push((address.to_string(), before.map(str::to_string)));

        if self.failing_addresses.contains(address) {
            return Err(LedgerError::Status(503));
        }

        let history = match self.histories.get(address) {
            Some(history) => history,
            None => return Ok(vec![]),
        };

        let start = match before {
            Some(cursor) => match history.iter().position(|r| r.signature == cursor) {
                Some(index) => index + 1,
                None => return Ok(vec![]),
            },
            None => 0,
        };

        Ok(history.iter().skip(start).take(limit).cloned().collect())
    }

    async fn fetch_detail(&self, signature: &str) -> Result<Option<TransactionDetail>> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.fetched.lock().unwrap().push(signature.to_string());

        if self.failing_signatures.contains(signature) {
            return Err(LedgerError::Unavailable("connection reset".to_string()));
        }

        if let Some(code) = self.rpc_errors.get(signature) {
            let error = LedgerError::Rpc {
                code: *code,
                message: "Transaction version (1) is not supported".to_string(),
            };
            return Err(error.for_transaction(signature));
        }

        if self.undecodable.contains(signature) {
            return Err(LedgerError::Decode {
                signature: signature.to_string(),
                reason: "missing message".to_string(),
            });
        }

        Ok(self.details.get(signature).cloned())
    }
}
