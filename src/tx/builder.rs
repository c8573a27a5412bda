// src/tx/builder.rs
//
// Transaction construction, signing and submission. Each submission attempt
// moves through Building -> Signed -> Submitted; mining is observed separately
// via `await_receipt`, which only flows that need the mined receipt invoke.

use crate::chain::client::{BlockTag, ChainClient};
use crate::error::{AgentError, Result};
use dashmap::DashMap;
use ethers_core::types::{
    Address, Bytes, TransactionReceipt, TransactionRequest, H256, U256,
};
use ethers_signers::{LocalWallet, Signer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// What to put on chain: a native value transfer or an encoded contract call
/// (including constructor deployment, where `to` is absent).
pub struct TxPayload {
    pub to: Option<Address>,
    pub value: U256,
    pub data: Option<Bytes>,
    pub gas: U256,
}

impl TxPayload {
    pub fn native_transfer(to: Address, value: U256, gas: u64) -> Self {
        Self {
            to: Some(to),
            value,
            data: None,
            gas: U256::from(gas),
        }
    }

    pub fn contract_call(to: Address, data: Bytes, gas: u64) -> Self {
        Self {
            to: Some(to),
            value: U256::zero(),
            data: Some(data),
            gas: U256::from(gas),
        }
    }

    pub fn deployment(bytecode: Bytes, gas: u64) -> Self {
        Self {
            to: None,
            value: U256::zero(),
            data: Some(bytecode),
            gas: U256::from(gas),
        }
    }
}

/// Builds, signs and submits transactions with the configured key.
///
/// Submissions for the same account are strictly serialized: the per-account
/// mutex is held across nonce fetch, signing and broadcast, so nonce N+1 is
/// never broadcast before nonce N. Accounts are independent of each other.
pub struct TxSubmitter {
    chain: Arc<ChainClient>,
    wallet: LocalWallet,
    chain_id: u64,
    account_locks: DashMap<Address, Arc<Mutex<()>>>,
}

impl TxSubmitter {
    pub fn new(chain: Arc<ChainClient>, wallet: LocalWallet, chain_id: u64) -> Self {
        let wallet = wallet.with_chain_id(chain_id);
        Self {
            chain,
            wallet,
            chain_id,
            account_locks: DashMap::new(),
        }
    }

    /// Address of the configured signing key.
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Serialization point for an account. Held for the whole
    /// fetch-nonce/sign/broadcast sequence.
    fn account_lock(&self, account: Address) -> Arc<Mutex<()>> {
        self.account_locks
            .entry(account)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Build, sign and broadcast one transaction, returning its hash without
    /// waiting for it to mine.
    ///
    /// Nonce and gas price are fetched fresh for every submission; nothing is
    /// reused across calls. The pending-tagged transaction count includes our
    /// own unmined submissions, so serialized submits get increasing nonces.
    pub async fn submit(&self, payload: TxPayload) -> Result<H256> {
        let from = self.address();
        let lock = self.account_lock(from);
        let _guard = lock.lock().await;

        // Building
        let nonce = self
            .chain
            .get_transaction_count(from, BlockTag::Pending)
            .await?;
        let gas_price = self.chain.gas_price().await?;

        let mut tx = TransactionRequest::new()
            .from(from)
            .nonce(nonce)
            .gas(payload.gas)
            .gas_price(gas_price)
            .value(payload.value)
            .chain_id(self.chain_id);
        if let Some(to) = payload.to {
            tx = tx.to(to);
        }
        if let Some(data) = payload.data {
            tx = tx.data(data);
        }

        // Signed. The key never leaves the wallet; only the signature does.
        let signature = self
            .wallet
            .sign_transaction(&tx.clone().into())
            .await
            .map_err(|e| AgentError::transport("failed to sign transaction", e))?;
        let raw = tx.rlp_signed(&signature);

        // Submitted
        let hash = self.chain.send_raw_transaction(raw).await?;
        info!(nonce = %nonce, hash = ?hash, "transaction broadcast");
        Ok(hash)
    }

    /// Poll for the receipt of a submitted transaction until `timeout`.
    ///
    /// A timeout releases the caller without affecting chain state; the
    /// transaction may still mine later, so this is reported, not treated as
    /// a submission failure.
    pub async fn await_receipt(&self, hash: H256, timeout: Duration) -> Result<TransactionReceipt> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(receipt) = self.chain.get_receipt(hash).await? {
                return Ok(receipt);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AgentError::DeploymentTimeout {
                    hash: format!("{:?}", hash),
                });
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL.min(timeout)).await;
        }
    }
}
