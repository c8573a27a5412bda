// src/lib.rs

use std::sync::Arc;
use std::time::Duration;

// Re-export commonly used types
pub use ethers_core::types::{Address, H256, U256};

// Re-export modules
pub mod agent;
pub mod chain;
pub mod config;
pub mod deploy;
pub mod error;
pub mod explorer;
pub mod llm;
pub mod tx;

use anyhow::Context;
use secrecy::ExposeSecret;

/// Long-lived components shared by the agent for the process lifetime.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: config::Config,
    /// JSON-RPC adapter for the configured chain
    pub chain: Arc<chain::client::ChainClient>,
    /// Block explorer client (ABI lookup, source verification)
    pub explorer: Arc<explorer::Explorer>,
    /// Chat-completions client
    pub llm: Arc<llm::LlmClient>,
    /// Transaction build/sign/submit pipeline
    pub submitter: Arc<tx::builder::TxSubmitter>,
}

impl AppState {
    /// Wire up every component from configuration.
    pub fn from_config(config: config::Config) -> anyhow::Result<Self> {
        let http_timeout = Duration::from_secs(config.http_timeout_secs);

        let chain = Arc::new(chain::client::ChainClient::new(
            config.rpc_url.clone(),
            http_timeout,
        )?);

        let explorer = Arc::new(explorer::Explorer::new(
            config.explorer_api_url.clone(),
            config.explorer_api_key.clone(),
            config.explorer_base_url.clone(),
            config.chain_id,
            http_timeout,
            Duration::from_secs(config.verify_retry_delay_secs),
        )?);

        let llm = Arc::new(llm::LlmClient::new(
            config.llm_base_url.clone(),
            config.llm_api_key.clone(),
            config.llm_model.clone(),
            http_timeout,
        )?);

        let wallet: ethers_signers::LocalWallet = config
            .private_key
            .expose_secret()
            .parse()
            .context("PRIVATE_KEY is not a valid secp256k1 key")?;
        let submitter = Arc::new(tx::builder::TxSubmitter::new(
            chain.clone(),
            wallet,
            config.chain_id,
        ));

        Ok(Self {
            config,
            chain,
            explorer,
            llm,
            submitter,
        })
    }

    /// Build the agent (guardrail, router, specialists, confirmation gate)
    /// over this state.
    pub fn agent(&self) -> agent::Agent {
        let toolbox = agent::tools::Toolbox::new(
            self.chain.clone(),
            self.explorer.clone(),
            self.submitter.clone(),
            self.config.gas_limit_transfer,
            self.config.gas_limit_approve,
            self.config.gas_limit_deploy,
            Duration::from_secs(self.config.receipt_timeout_secs),
        );
        agent::Agent::new(self.llm.clone(), toolbox)
    }
}
