// src/chain/client.rs

use crate::error::{AgentError, Result};
use ethers_core::types::{Address, Bytes, TransactionReceipt, H256, U256};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Block tag for state-dependent reads. User-facing queries report mined
/// state; nonce assignment must also see broadcast-but-unmined transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Pending,
}

impl BlockTag {
    fn as_str(self) -> &'static str {
        match self {
            BlockTag::Latest => "latest",
            BlockTag::Pending => "pending",
        }
    }
}

/// Thin typed adapter over the chain's JSON-RPC surface.
///
/// Read operations are stateless and side-effect free; callers may retry them
/// on transient failures. Submission is exposed here as a raw broadcast only,
/// ordering and signing live in the transaction builder.
#[derive(Clone)]
pub struct ChainClient {
    http: Client,
    rpc_url: String,
}

impl ChainClient {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::transport("failed to build RPC HTTP client", e))?;
        Ok(Self {
            http,
            rpc_url: rpc_url.into(),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Issue a single JSON-RPC call and unwrap the `result` field.
    async fn rpc(&self, method: &str, params: Value) -> Result<Value> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response: Value = self
            .http
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AgentError::transport(format!("{} request failed", method), e))?
            .json()
            .await
            .map_err(|e| AgentError::transport(format!("{} returned invalid JSON", method), e))?;

        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
                .unwrap_or_else(|| error.to_string());
            return Err(AgentError::from_node_reject(method, message));
        }

        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    fn quantity(method: &str, value: &Value) -> Result<U256> {
        let hex = value.as_str().ok_or_else(|| {
            AgentError::transport(method.to_string(), "result is not a quantity string")
        })?;
        U256::from_str_radix(hex.trim_start_matches("0x"), 16)
            .map_err(|e| AgentError::transport(format!("{} returned malformed quantity", method), e))
    }

    /// Balance of an account in wei.
    pub async fn get_balance(&self, address: Address) -> Result<U256> {
        let result = self
            .rpc("eth_getBalance", json!([format!("{:?}", address), "latest"]))
            .await?;
        Self::quantity("eth_getBalance", &result)
    }

    /// Transaction count of an account at the given tag. Queries report the
    /// mined count (`Latest`); nonce assignment passes `Pending` so
    /// broadcast-but-unmined transactions are included.
    pub async fn get_transaction_count(&self, address: Address, tag: BlockTag) -> Result<U256> {
        let result = self
            .rpc(
                "eth_getTransactionCount",
                json!([format!("{:?}", address), tag.as_str()]),
            )
            .await?;
        Self::quantity("eth_getTransactionCount", &result)
    }

    /// Deployed bytecode at an address. An address with no code returns the
    /// explicit empty result `0x`, not an error.
    pub async fn get_code(&self, address: Address) -> Result<String> {
        let result = self
            .rpc("eth_getCode", json!([format!("{:?}", address), "latest"]))
            .await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| AgentError::transport("eth_getCode", "result is not a string"))
    }

    /// Chain id reported by the node.
    pub async fn chain_id(&self) -> Result<U256> {
        let result = self.rpc("eth_chainId", json!([])).await?;
        Self::quantity("eth_chainId", &result)
    }

    /// Current gas price in wei.
    pub async fn gas_price(&self) -> Result<U256> {
        let result = self.rpc("eth_gasPrice", json!([])).await?;
        Self::quantity("eth_gasPrice", &result)
    }

    /// Read-only contract call.
    pub async fn call(&self, to: Address, data: &Bytes) -> Result<Bytes> {
        let result = self
            .rpc(
                "eth_call",
                json!([
                    {"to": format!("{:?}", to), "data": format!("0x{}", hex::encode(data))},
                    "latest"
                ]),
            )
            .await?;
        let hex = result
            .as_str()
            .ok_or_else(|| AgentError::transport("eth_call", "result is not a string"))?;
        let bytes = hex::decode(hex.trim_start_matches("0x"))
            .map_err(|e| AgentError::transport("eth_call returned malformed hex", e))?;
        Ok(Bytes::from(bytes))
    }

    /// Broadcast a signed raw transaction, returning its hash immediately.
    ///
    /// Callers must never blindly retry this on a transport error, the
    /// transaction may already have been accepted by the node.
    pub async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256> {
        let result = self
            .rpc(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(&raw))]),
            )
            .await?;
        let hex = result.as_str().ok_or_else(|| {
            AgentError::transport("eth_sendRawTransaction", "result is not a hash string")
        })?;
        hex.parse::<H256>()
            .map_err(|e| AgentError::transport("eth_sendRawTransaction returned malformed hash", e))
    }

    /// Receipt of a mined transaction, or `None` while it is still pending.
    pub async fn get_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>> {
        let result = self
            .rpc("eth_getTransactionReceipt", json!([format!("{:?}", hash)]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        serde_json::from_value(result)
            .map(Some)
            .map_err(|e| AgentError::transport("eth_getTransactionReceipt decode failed", e))
    }
}
