// src/explorer.rs
//
// Block-explorer service client: ABI lookup by address and contract source
// verification. Both are Etherscan-style APIs parameterized by chain id.

use crate::error::{AgentError, Result};
use dashmap::DashMap;
use ethers_core::abi::Abi;
use ethers_core::types::{Address, H256};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

/// Envelope every Etherscan-style endpoint responds with. `status` is the
/// string `"1"` on success; `result` carries either the payload or an error
/// description.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    status: String,
    #[serde(default)]
    result: serde_json::Value,
}

/// Parameters submitted alongside the flattened source for verification.
pub struct VerifyRequest<'a> {
    pub contract_address: Address,
    pub contract_name: &'a str,
    pub source: &'a str,
    pub compiler_version: &'a str,
    pub optimization_runs: u32,
}

pub struct Explorer {
    http: Client,
    api_url: String,
    api_key: String,
    browser_url: String,
    chain_id: u64,
    verify_retry_delay: Duration,
    // Successful ABI lookups only; error responses are never cached.
    abi_cache: DashMap<Address, Abi>,
}

impl Explorer {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        browser_url: impl Into<String>,
        chain_id: u64,
        timeout: Duration,
        verify_retry_delay: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::transport("failed to build explorer HTTP client", e))?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
            browser_url: browser_url.into().trim_end_matches('/').to_string(),
            chain_id,
            verify_retry_delay,
            abi_cache: DashMap::new(),
        })
    }

    /// Outward-facing explorer link for a transaction hash.
    pub fn tx_link(&self, hash: H256) -> String {
        format!("{}/tx/{:?}", self.browser_url, hash)
    }

    /// Resolve the verified ABI for a contract address.
    ///
    /// Address-not-found, rate limiting and service errors all surface as
    /// `MetadataUnavailable`; the caller decides whether that is fatal.
    pub async fn abi(&self, address: Address) -> Result<Abi> {
        if let Some(cached) = self.abi_cache.get(&address) {
            return Ok(cached.clone());
        }

        let envelope: ApiEnvelope = self
            .http
            .get(&self.api_url)
            .query(&[
                ("chainid", self.chain_id.to_string()),
                ("module", "contract".to_string()),
                ("action", "getabi".to_string()),
                ("address", format!("{:?}", address)),
                ("apikey", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| AgentError::transport("explorer ABI lookup failed", e))?
            .json()
            .await
            .map_err(|e| AgentError::transport("explorer ABI response invalid", e))?;

        if envelope.status != "1" {
            return Err(AgentError::MetadataUnavailable(format!(
                "explorer returned no ABI for {:?}: {}",
                address,
                envelope.result.as_str().unwrap_or("unknown error")
            )));
        }

        let abi_json = envelope.result.as_str().ok_or_else(|| {
            AgentError::MetadataUnavailable(format!("explorer ABI for {:?} is not a string", address))
        })?;
        let abi: Abi = serde_json::from_str(abi_json).map_err(|e| {
            AgentError::MetadataUnavailable(format!("ABI for {:?} does not parse: {}", address, e))
        })?;

        self.abi_cache.insert(address, abi.clone());
        Ok(abi)
    }

    /// Submit contract source for verification, returning the submission guid.
    ///
    /// Explorer indexing lags chain state, so one bounded retry is allowed
    /// before the attempt is reported as failed. Verification failure is
    /// non-fatal to the deployment that triggered it.
    pub async fn verify_source(&self, request: &VerifyRequest<'_>) -> Result<String> {
        let mut last_error = String::new();
        for attempt in 0..2 {
            if attempt > 0 {
                tokio::time::sleep(self.verify_retry_delay).await;
            }
            match self.submit_verification(request).await {
                Ok(guid) => {
                    info!(%guid, "verification submitted");
                    return Ok(guid);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "verification attempt failed");
                    last_error = e.to_string();
                }
            }
        }
        Err(AgentError::VerificationFailed(last_error))
    }

    async fn submit_verification(&self, request: &VerifyRequest<'_>) -> Result<String> {
        let params = [
            ("chainid", self.chain_id.to_string()),
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("apikey", self.api_key.clone()),
            ("contractaddress", format!("{:?}", request.contract_address)),
            ("sourceCode", request.source.to_string()),
            ("codeformat", "solidity-single-file".to_string()),
            ("contractname", request.contract_name.to_string()),
            ("compilerversion", request.compiler_version.to_string()),
            ("optimizationUsed", "1".to_string()),
            ("runs", request.optimization_runs.to_string()),
            ("constructorArguements", String::new()),
        ];

        let envelope: ApiEnvelope = self
            .http
            .post(&self.api_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AgentError::transport("explorer verification request failed", e))?
            .json()
            .await
            .map_err(|e| AgentError::transport("explorer verification response invalid", e))?;

        if envelope.status == "1" {
            Ok(envelope
                .result
                .as_str()
                .unwrap_or_default()
                .to_string())
        } else {
            Err(AgentError::VerificationFailed(
                envelope
                    .result
                    .as_str()
                    .unwrap_or("unknown verification error")
                    .to_string(),
            ))
        }
    }
}
