//! Blockchain anchor submitter boundary (spec §4.J "anchor the root to the
//! configured blockchain").
//!
//! The spec names no specific chain, so `routefare-ticketing` never speaks
//! to one directly — the wiring layer supplies an [`AnchorSubmitter`]. This
//! mirrors `routefare-payment`'s `PaymentGateway` boundary: the real
//! submission path is a thin HTTP JSON-RPC client behind the trait, with
//! an in-memory fake for tests, so signing/batching/proof logic stays
//! decoupled from any one chain's wire format.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;

/// Errors raised submitting a root or polling confirmations.
#[derive(Debug, Error)]
pub enum AnchorError {
    /// The chain RPC endpoint is unreachable or timed out. Retriable.
    #[error("anchor RPC unreachable: {0}")]
    Transient(String),
    /// The chain rejected the submission outright.
    #[error("anchor submission rejected: {0}")]
    Rejected(String),
}

/// Submits Merkle roots to a blockchain and reports confirmation depth.
#[async_trait]
pub trait AnchorSubmitter: Send + Sync {
    /// Submit `root` (lowercase-hex) to the configured chain, returning
    /// the transaction hash.
    ///
    /// # Errors
    ///
    /// Returns [`AnchorError`] if the chain rejects or cannot be reached.
    async fn submit_root(&self, root: &str) -> Result<String, AnchorError>;

    /// Current confirmation depth for `tx_hash`.
    ///
    /// # Errors
    ///
    /// Returns [`AnchorError`] if the chain cannot be reached.
    async fn get_confirmations(&self, tx_hash: &str) -> Result<u32, AnchorError>;
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'a str,
    method: &'a str,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    message: String,
}

/// Thin HTTP JSON-RPC client speaking to a configured blockchain node.
///
/// The wire format (method names `anchor_submitRoot` /
/// `anchor_getConfirmations`) is this workspace's own convention, not a
/// real chain's — the spec leaves the chain unspecified, so this exists
/// only to give `AnchorSubmitter` a concrete, network-facing
/// implementation rather than leaving it purely abstract.
pub struct HttpAnchorSubmitter {
    client: reqwest::Client,
    rpc_url: String,
}

impl HttpAnchorSubmitter {
    /// Build a client against `rpc_url`.
    #[must_use]
    pub fn new(rpc_url: String) -> Self {
        Self { client: reqwest::Client::new(), rpc_url }
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, AnchorError> {
        let request = JsonRpcRequest { jsonrpc: "2.0", method, params, id: 1 };
        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnchorError::Transient(e.to_string()))?;
        let body: JsonRpcResponse<T> =
            response.json().await.map_err(|e| AnchorError::Transient(e.to_string()))?;
        if let Some(error) = body.error {
            return Err(AnchorError::Rejected(error.message));
        }
        body.result.ok_or_else(|| AnchorError::Transient("empty RPC result".to_string()))
    }
}

#[async_trait]
impl AnchorSubmitter for HttpAnchorSubmitter {
    async fn submit_root(&self, root: &str) -> Result<String, AnchorError> {
        self.call("anchor_submitRoot", serde_json::json!({ "root": root })).await
    }

    async fn get_confirmations(&self, tx_hash: &str) -> Result<u32, AnchorError> {
        self.call("anchor_getConfirmations", serde_json::json!({ "txHash": tx_hash })).await
    }
}

/// In-memory fake for tests: every submission "confirms" instantly up to
/// a fixed depth, with no network involved.
#[derive(Default)]
pub struct FakeAnchorSubmitter {
    confirmations: Mutex<std::collections::HashMap<String, u32>>,
    next_confirmations: u32,
}

impl FakeAnchorSubmitter {
    /// Build a fake that reports `confirmations` for every tx it submits.
    #[must_use]
    pub fn with_confirmations(confirmations: u32) -> Self {
        Self { confirmations: Mutex::new(std::collections::HashMap::new()), next_confirmations: confirmations }
    }
}

#[async_trait]
impl AnchorSubmitter for FakeAnchorSubmitter {
    async fn submit_root(&self, root: &str) -> Result<String, AnchorError> {
        let tx_hash = format!("fake-tx-{root}");
        self.confirmations
            .lock()
            .map_err(|_| AnchorError::Transient("poisoned lock".to_string()))?
            .insert(tx_hash.clone(), self.next_confirmations);
        Ok(tx_hash)
    }

    async fn get_confirmations(&self, tx_hash: &str) -> Result<u32, AnchorError> {
        Ok(self
            .confirmations
            .lock()
            .map_err(|_| AnchorError::Transient("poisoned lock".to_string()))?
            .get(tx_hash)
            .copied()
            .unwrap_or(0))
    }
}
