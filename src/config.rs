// src/config.rs

use anyhow::{Context, Result};
use secrecy::SecretString;
use std::env;

// All configuration is loaded once at startup from the environment (and an
// optional .env file) and passed explicitly into each component.
#[derive(Clone)]
pub struct Config {
    // Chain settings (one EVM chain per process)
    pub rpc_url: String,
    pub chain_id: u64,

    // The single configured signing key. Held as a secret; components other
    // than the transaction builder never see it.
    pub private_key: SecretString,

    // Explorer settings (ABI lookup + source verification)
    pub explorer_api_url: String,
    pub explorer_api_key: String,
    pub explorer_base_url: String,

    // Language model settings (OpenAI-compatible chat completions endpoint)
    pub llm_base_url: String,
    pub llm_api_key: SecretString,
    pub llm_model: String,

    // Transaction settings
    pub gas_limit_transfer: u64,
    pub gas_limit_approve: u64,
    pub gas_limit_deploy: u64,

    // Timeouts
    pub http_timeout_secs: u64,
    pub receipt_timeout_secs: u64,
    pub verify_retry_delay_secs: u64,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();

        Ok(Config {
            rpc_url: env::var("RPC_URL").context("RPC_URL must be set to a JSON-RPC endpoint")?,
            chain_id: env::var("CHAIN_ID")
                .context("CHAIN_ID must be set")?
                .parse::<u64>()
                .context("CHAIN_ID must be a valid number")?,

            private_key: SecretString::from(
                env::var("PRIVATE_KEY").context("PRIVATE_KEY must be set to the signing key")?,
            ),

            explorer_api_url: env::var("EXPLORER_API_URL")
                .unwrap_or_else(|_| "https://api.etherscan.io/v2/api".to_string()),
            explorer_api_key: env::var("EXPLORER_API_KEY")
                .context("EXPLORER_API_KEY must be set")?,
            explorer_base_url: env::var("EXPLORER_BASE_URL")
                .unwrap_or_else(|_| "https://testnet.bscscan.com".to_string()),

            llm_base_url: env::var("LLM_BASE_URL")
                .context("LLM_BASE_URL must be set to an OpenAI-compatible endpoint")?,
            llm_api_key: SecretString::from(
                env::var("LLM_API_KEY").context("LLM_API_KEY must be set")?,
            ),
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string()),

            gas_limit_transfer: env::var("GAS_LIMIT_TRANSFER")
                .unwrap_or_else(|_| "2000000".to_string())
                .parse()
                .context("GAS_LIMIT_TRANSFER must be a valid number")?,
            gas_limit_approve: env::var("GAS_LIMIT_APPROVE")
                .unwrap_or_else(|_| "200000".to_string())
                .parse()
                .context("GAS_LIMIT_APPROVE must be a valid number")?,
            gas_limit_deploy: env::var("GAS_LIMIT_DEPLOY")
                .unwrap_or_else(|_| "3000000".to_string())
                .parse()
                .context("GAS_LIMIT_DEPLOY must be a valid number")?,

            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("HTTP_TIMEOUT_SECS must be a valid number")?,
            receipt_timeout_secs: env::var("RECEIPT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .context("RECEIPT_TIMEOUT_SECS must be a valid number")?,
            verify_retry_delay_secs: env::var("VERIFY_RETRY_DELAY_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("VERIFY_RETRY_DELAY_SECS must be a valid number")?,
        })
    }
}
