// src/agent/tools.rs
//
// Tool schemas advertised to the model and their executor. Read tools run
// immediately; write tools never submit anything here, they register a
// pending action with the confirmation gate and return its summary. The
// literal output strings below are part of the user-facing contract.

use crate::agent::confirm::{ConfirmationGate, PendingAction, Resolution};
use crate::chain::address;
use crate::chain::client::{BlockTag, ChainClient};
use crate::chain::erc20::{self, MetadataCache, TokenMetadata};
use crate::chain::units;
use crate::deploy::{self, DeploymentResult, TokenParams, VerificationStatus};
use crate::error::{AgentError, Result};
use crate::explorer::Explorer;
use crate::llm::ToolDef;
use crate::tx::builder::{TxPayload, TxSubmitter};
use ethers_core::types::U256;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

pub struct Toolbox {
    chain: Arc<ChainClient>,
    explorer: Arc<Explorer>,
    submitter: Arc<TxSubmitter>,
    metadata: MetadataCache,
    gate: Mutex<ConfirmationGate>,
    gas_limit_transfer: u64,
    gas_limit_approve: u64,
    gas_limit_deploy: u64,
    receipt_timeout: Duration,
}

#[derive(Deserialize)]
struct AccountArgs {
    account: String,
}

#[derive(Deserialize)]
struct TokenBalanceArgs {
    account: String,
    token_address: String,
}

#[derive(Deserialize)]
struct TokenInfoArgs {
    token_address: String,
}

#[derive(Deserialize)]
struct TransferEthArgs {
    account_1: String,
    account_2: String,
    amount: Value,
}

#[derive(Deserialize)]
struct TransferTokenArgs {
    account_1: String,
    account_2: String,
    token_address: String,
    amount: Value,
}

#[derive(Deserialize)]
struct ApproveTokenArgs {
    owner: String,
    spender: String,
    token_address: String,
    amount: Value,
}

#[derive(Deserialize)]
struct DeployArgs {
    recipient_address: String,
    token_name: String,
    token_symbol: String,
    token_decimals: u32,
    initial_supply: u64,
}

impl Toolbox {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain: Arc<ChainClient>,
        explorer: Arc<Explorer>,
        submitter: Arc<TxSubmitter>,
        gas_limit_transfer: u64,
        gas_limit_approve: u64,
        gas_limit_deploy: u64,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            chain,
            explorer,
            submitter,
            metadata: MetadataCache::new(),
            gate: Mutex::new(ConfirmationGate::new()),
            gas_limit_transfer,
            gas_limit_approve,
            gas_limit_deploy,
            receipt_timeout,
        }
    }

    /// Execute one tool call. Failures become descriptive result strings;
    /// a tool call never aborts the turn.
    pub async fn execute(&self, name: &str, arguments: &str) -> String {
        info!(tool = name, "tool call");
        match self.dispatch(name, arguments).await {
            Ok(output) => output,
            Err(e) => format!("Error: {}", e),
        }
    }

    pub async fn has_pending_confirmation(&self) -> bool {
        self.gate.lock().await.has_pending()
    }

    /// Match a user reply against the pending confirmation, if any.
    pub async fn resolve_confirmation(&self, reply: &str) -> Resolution {
        self.gate.lock().await.resolve(reply)
    }

    /// Execute an action the user has just confirmed. This is the only path
    /// from a pending action to a signed transaction.
    pub async fn execute_confirmed(&self, action: PendingAction) -> String {
        match self.run_confirmed(action).await {
            Ok(output) => output,
            Err(e) => format!("Error: {}", e),
        }
    }

    async fn dispatch(&self, name: &str, arguments: &str) -> Result<String> {
        let parse_failure = |e: serde_json::Error| {
            AgentError::InvalidParameter(format!("bad arguments for {}: {}", name, e))
        };
        match name {
            "eth_get_balance" => {
                let args: AccountArgs = serde_json::from_str(arguments).map_err(parse_failure)?;
                self.eth_get_balance(&args.account).await
            }
            "eth_get_transaction_count" => {
                let args: AccountArgs = serde_json::from_str(arguments).map_err(parse_failure)?;
                self.eth_get_transaction_count(&args.account).await
            }
            "eth_get_code" => {
                let args: AccountArgs = serde_json::from_str(arguments).map_err(parse_failure)?;
                self.eth_get_code(&args.account).await
            }
            "eth_gas_price" => self.eth_gas_price().await,
            "token_get_balance" => {
                let args: TokenBalanceArgs =
                    serde_json::from_str(arguments).map_err(parse_failure)?;
                self.token_get_balance(&args.account, &args.token_address).await
            }
            "token_get_info" => {
                let args: TokenInfoArgs = serde_json::from_str(arguments).map_err(parse_failure)?;
                self.token_get_info(&args.token_address).await
            }
            "transfer_eth" => {
                let args: TransferEthArgs =
                    serde_json::from_str(arguments).map_err(parse_failure)?;
                self.propose_transfer_eth(args).await
            }
            "transfer_token" => {
                let args: TransferTokenArgs =
                    serde_json::from_str(arguments).map_err(parse_failure)?;
                self.propose_transfer_token(args).await
            }
            "approve_token" => {
                let args: ApproveTokenArgs =
                    serde_json::from_str(arguments).map_err(parse_failure)?;
                self.propose_approve_token(args).await
            }
            "deploy_erc20_token" => {
                let args: DeployArgs = serde_json::from_str(arguments).map_err(parse_failure)?;
                self.propose_deploy(args).await
            }
            other => Err(AgentError::InvalidParameter(format!(
                "unknown tool {}",
                other
            ))),
        }
    }

    // <-------- read tools -------->

    async fn eth_get_balance(&self, account: &str) -> Result<String> {
        let (addr, checksummed) = address::normalize(account)?;
        let wei = self.chain.get_balance(addr).await?;
        Ok(format_eth_balance(&checksummed, wei))
    }

    async fn eth_get_transaction_count(&self, account: &str) -> Result<String> {
        let (addr, checksummed) = address::normalize(account)?;
        // User-facing count, so mined state only.
        let count = self
            .chain
            .get_transaction_count(addr, BlockTag::Latest)
            .await?;
        Ok(format!("Account {} has {} transactions.", checksummed, count))
    }

    async fn eth_get_code(&self, account: &str) -> Result<String> {
        let (addr, checksummed) = address::normalize(account)?;
        let code = self.chain.get_code(addr).await?;
        Ok(format!("Account {} has bytecode: {}", checksummed, code))
    }

    async fn eth_gas_price(&self) -> Result<String> {
        let wei = self.chain.gas_price().await?;
        Ok(format!("Current gas price: {} gwei", units::wei_to_gwei(wei)))
    }

    async fn token_get_balance(&self, account: &str, token_address: &str) -> Result<String> {
        let (owner, owner_checksummed) = address::normalize(account)?;
        let (token, _) = address::normalize(token_address)?;
        let abi = self.explorer.abi(token).await?;
        let meta = self.metadata.get_or_fetch(&self.chain, &abi, token).await?;
        let balance = erc20::balance_of(&self.chain, &abi, token, owner).await?;
        Ok(format_token_balance(&owner_checksummed, &meta, balance))
    }

    async fn token_get_info(&self, token_address: &str) -> Result<String> {
        let (token, _) = address::normalize(token_address)?;
        let abi = self.explorer.abi(token).await?;
        let meta = self.metadata.get_or_fetch(&self.chain, &abi, token).await?;
        Ok(format_token_info(&meta))
    }

    // <-------- write tools (proposal only) -------->

    async fn propose_transfer_eth(&self, args: TransferEthArgs) -> Result<String> {
        // The sender address is validated for shape; signing always uses the
        // configured key.
        address::normalize(&args.account_1)?;
        let (to, _) = address::normalize(&args.account_2)?;
        let amount = amount_text(&args.amount)?;
        let value_wei = units::eth_to_wei(&amount)?;
        Ok(self
            .gate
            .lock()
            .await
            .propose(PendingAction::TransferEth {
                to,
                amount,
                value_wei,
            }))
    }

    async fn propose_transfer_token(&self, args: TransferTokenArgs) -> Result<String> {
        address::normalize(&args.account_1)?;
        let (to, _) = address::normalize(&args.account_2)?;
        let (token, _) = address::normalize(&args.token_address)?;
        // Decimals come from the token contract, resolved before any amount
        // conversion. No ABI, no transfer.
        let abi = self.explorer.abi(token).await?;
        let meta = self.metadata.get_or_fetch(&self.chain, &abi, token).await?;
        let amount = amount_text(&args.amount)?;
        let base_units = units::to_base_units(&amount, meta.decimals)?;
        Ok(self.gate.lock().await.propose(PendingAction::TransferToken {
            token: meta,
            to,
            amount,
            base_units,
        }))
    }

    async fn propose_approve_token(&self, args: ApproveTokenArgs) -> Result<String> {
        address::normalize(&args.owner)?;
        let (spender, _) = address::normalize(&args.spender)?;
        let (token, _) = address::normalize(&args.token_address)?;
        let abi = self.explorer.abi(token).await?;
        let meta = self.metadata.get_or_fetch(&self.chain, &abi, token).await?;
        let amount = amount_text(&args.amount)?;
        let base_units = units::to_base_units(&amount, meta.decimals)?;
        Ok(self.gate.lock().await.propose(PendingAction::ApproveToken {
            token: meta,
            spender,
            amount,
            base_units,
        }))
    }

    async fn propose_deploy(&self, args: DeployArgs) -> Result<String> {
        let (recipient, _) = address::normalize(&args.recipient_address)?;
        let params = TokenParams {
            recipient,
            name: args.token_name,
            symbol: args.token_symbol,
            decimals: args.token_decimals,
            initial_supply: args.initial_supply,
        };
        params.validate()?;
        Ok(self.gate.lock().await.propose(PendingAction::DeployToken(params)))
    }

    // <-------- confirmed execution -------->

    async fn run_confirmed(&self, action: PendingAction) -> Result<String> {
        match action {
            PendingAction::TransferEth { to, value_wei, .. } => {
                let hash = self
                    .submitter
                    .submit(TxPayload::native_transfer(to, value_wei, self.gas_limit_transfer))
                    .await?;
                Ok(format_tx_link(&self.explorer, hash))
            }
            PendingAction::TransferToken {
                token, to, base_units, ..
            } => {
                let abi = self.explorer.abi(token.address).await?;
                let data = erc20::transfer_calldata(&abi, token.address, to, base_units)?;
                let hash = self
                    .submitter
                    .submit(TxPayload::contract_call(
                        token.address,
                        data,
                        self.gas_limit_transfer,
                    ))
                    .await?;
                Ok(format_tx_link(&self.explorer, hash))
            }
            PendingAction::ApproveToken {
                token,
                spender,
                base_units,
                ..
            } => {
                let abi = self.explorer.abi(token.address).await?;
                let data = erc20::approve_calldata(&abi, token.address, spender, base_units)?;
                let hash = self
                    .submitter
                    .submit(TxPayload::contract_call(
                        token.address,
                        data,
                        self.gas_limit_approve,
                    ))
                    .await?;
                Ok(format_tx_link(&self.explorer, hash))
            }
            PendingAction::DeployToken(params) => {
                let result = deploy::run(
                    &self.submitter,
                    &self.explorer,
                    &params,
                    self.gas_limit_deploy,
                    self.receipt_timeout,
                )
                .await?;
                Ok(format_deployment(&self.explorer, &result))
            }
        }
    }
}

fn amount_text(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(AgentError::InvalidParameter(format!(
            "amount must be a number or decimal string, got {}",
            other
        ))),
    }
}

fn format_eth_balance(checksummed: &str, wei: U256) -> String {
    format!("Account {} has {} ETH.", checksummed, units::wei_to_eth_5dp(wei))
}

fn format_token_balance(account: &str, meta: &TokenMetadata, balance: U256) -> String {
    format!(
        "Account Address: {}\nToken Name: {}\nToken Symbol: {}\nToken Decimals: {}\nToken Address: {}\nToken Balance: {}",
        account,
        meta.name,
        meta.symbol,
        meta.decimals,
        address::checksum(meta.address),
        units::from_base_units(balance, meta.decimals)
    )
}

fn format_token_info(meta: &TokenMetadata) -> String {
    format!(
        "Token Name: {}\nToken Symbol: {}\nToken Decimals: {}\nToken Address: {}",
        meta.name,
        meta.symbol,
        meta.decimals,
        address::checksum(meta.address)
    )
}

fn format_tx_link(explorer: &Explorer, hash: ethers_core::types::H256) -> String {
    format!("Blockchain Transaction Link: {}", explorer.tx_link(hash))
}

fn format_deployment(explorer: &Explorer, result: &DeploymentResult) -> String {
    let link = explorer.tx_link(result.tx_hash);
    let verification = match &result.verification {
        VerificationStatus::Submitted(guid) => {
            format!("✅ Verification Submitted. GUID: {}", guid)
        }
        VerificationStatus::Failed(reason) => format!("🔴 Verification Failed: {}", reason),
        VerificationStatus::Skipped => {
            "⏳ Verification Skipped: contract address not yet known.".to_string()
        }
    };
    match result.contract_address {
        Some(addr) => format!(
            "✅ Token Deployed Successfully!\n🔗 Contract Address: {}\n🔗 Explorer Tx: {}\n{}",
            address::checksum(addr),
            link,
            verification
        ),
        None => format!(
            "⏳ Deployment Broadcast, Receipt Pending.\n🔗 Explorer Tx: {}\n{}",
            link, verification
        ),
    }
}

// <-------- tool schemas -------->

fn account_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "account": {"type": "string", "description": "Ethereum account address"}
        },
        "required": ["account"]
    })
}

/// Tools for the read-only query specialist.
pub fn query_tools() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "eth_get_balance",
            description: "Fetches the ETH balance of a single account address. Call this tool separately for each address when multiple addresses are requested.",
            parameters: account_schema(),
        },
        ToolDef {
            name: "eth_get_transaction_count",
            description: "Fetches the transaction count for a given Ethereum wallet address. Call this tool separately for each address when multiple addresses are requested.",
            parameters: account_schema(),
        },
        ToolDef {
            name: "eth_get_code",
            description: "Fetches the byte code for a given Ethereum smart contract address. Call this tool separately for each address when multiple addresses are requested.",
            parameters: account_schema(),
        },
        ToolDef {
            name: "eth_gas_price",
            description: "Fetches the current gas price for the blockchain network.",
            parameters: json!({"type": "object", "properties": {}}),
        },
        ToolDef {
            name: "token_get_balance",
            description: "Fetches the ERC20 token balance and details for an account address. Call this tool separately for each address when multiple addresses are requested.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "account": {"type": "string", "description": "Ethereum account address"},
                    "token_address": {"type": "string", "description": "ERC20 token contract address"}
                },
                "required": ["account", "token_address"]
            }),
        },
        ToolDef {
            name: "token_get_info",
            description: "Fetches ERC20 token information (name, symbol, decimals) for a token contract address.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "token_address": {"type": "string", "description": "ERC20 token contract address"}
                },
                "required": ["token_address"]
            }),
        },
    ]
}

/// Tools for the native transaction specialist.
pub fn native_tools() -> Vec<ToolDef> {
    vec![ToolDef {
        name: "transfer_eth",
        description: "Transfers ETH from one account to another. Returns a transaction summary that must be confirmed by the user before anything is sent. Call this tool separately for each recipient when transferring to multiple addresses.",
        parameters: json!({
            "type": "object",
            "properties": {
                "account_1": {"type": "string", "description": "The 'from' account address"},
                "account_2": {"type": "string", "description": "The 'to' account address"},
                "amount": {"type": "number", "description": "The amount of ETH to transfer"}
            },
            "required": ["account_1", "account_2", "amount"]
        }),
    }]
}

/// Tools for the smart contract transaction specialist.
pub fn contract_tools() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "transfer_token",
            description: "Transfers ERC20 tokens from one account to another. Returns a transaction summary that must be confirmed by the user before anything is sent. Call this tool separately for each recipient when transferring to multiple addresses.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "account_1": {"type": "string", "description": "The 'from' account address"},
                    "account_2": {"type": "string", "description": "The 'to' account address"},
                    "token_address": {"type": "string", "description": "ERC20 token contract address"},
                    "amount": {"type": "number", "description": "The amount of tokens to transfer"}
                },
                "required": ["account_1", "account_2", "token_address", "amount"]
            }),
        },
        ToolDef {
            name: "approve_token",
            description: "Approves an ERC20 token allowance for a spender. Returns a transaction summary that must be confirmed by the user before anything is sent.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "owner": {"type": "string", "description": "The account granting the allowance"},
                    "spender": {"type": "string", "description": "The account being approved to spend tokens"},
                    "token_address": {"type": "string", "description": "ERC20 token contract address"},
                    "amount": {"type": "number", "description": "The allowance amount"}
                },
                "required": ["owner", "spender", "token_address", "amount"]
            }),
        },
        ToolDef {
            name: "deploy_erc20_token",
            description: "Deploys a new ERC20 token contract with the given parameters and verifies it on the block explorer. Returns a transaction summary that must be confirmed by the user before anything is sent.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "recipient_address": {"type": "string", "description": "Address that receives the initial supply"},
                    "token_name": {"type": "string", "description": "Token name, e.g. 'My Token'"},
                    "token_symbol": {"type": "string", "description": "Token symbol, e.g. 'MTK'"},
                    "token_decimals": {"type": "integer", "description": "Decimal places, typically 18"},
                    "initial_supply": {"type": "integer", "description": "Initial supply in whole tokens"}
                },
                "required": ["recipient_address", "token_name", "token_symbol", "token_decimals", "initial_supply"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_core::types::{Address, H256};
    use std::str::FromStr;

    fn meta() -> TokenMetadata {
        TokenMetadata {
            name: "USD Coin".to_string(),
            symbol: "USDC".to_string(),
            decimals: 6,
            address: Address::from_str("0xEce5E455A8191E42a2b8162124248cb20Ceea76f").unwrap(),
        }
    }

    fn explorer() -> Explorer {
        Explorer::new(
            "https://api.etherscan.io/v2/api",
            "key",
            "https://testnet.bscscan.com",
            97,
            Duration::from_secs(5),
            Duration::from_secs(0),
        )
        .unwrap()
    }

    #[test]
    fn eth_balance_line_has_five_decimals() {
        let line = format_eth_balance(
            "0xC9654530E08907D0Ea73E17fa8EF8964129A3dB7",
            U256::from(1_500_000_000_000_000_000u64),
        );
        assert_eq!(
            line,
            "Account 0xC9654530E08907D0Ea73E17fa8EF8964129A3dB7 has 1.50000 ETH."
        );
    }

    #[test]
    fn zero_balance_formats_as_zero_point_five_zeros() {
        let line = format_eth_balance("0xC9654530E08907D0Ea73E17fa8EF8964129A3dB7", U256::zero());
        assert!(line.contains("has 0.00000 ETH."));
    }

    #[test]
    fn token_balance_block_field_order() {
        let block = format_token_balance(
            "0xC9654530E08907D0Ea73E17fa8EF8964129A3dB7",
            &meta(),
            U256::from(1_200_500_000u64),
        );
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines[0], "Account Address: 0xC9654530E08907D0Ea73E17fa8EF8964129A3dB7");
        assert_eq!(lines[1], "Token Name: USD Coin");
        assert_eq!(lines[2], "Token Symbol: USDC");
        assert_eq!(lines[3], "Token Decimals: 6");
        assert_eq!(lines[4], "Token Address: 0xEce5E455A8191E42a2b8162124248cb20Ceea76f");
        assert_eq!(lines[5], "Token Balance: 1200.5");
    }

    #[test]
    fn token_info_block_field_order() {
        let block = format_token_info(&meta());
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines[0], "Token Name: USD Coin");
        assert_eq!(lines[3], "Token Address: 0xEce5E455A8191E42a2b8162124248cb20Ceea76f");
    }

    #[test]
    fn tx_link_uses_explorer_base() {
        let hash = H256::from_low_u64_be(0xabcd);
        let line = format_tx_link(&explorer(), hash);
        assert!(line.starts_with("Blockchain Transaction Link: https://testnet.bscscan.com/tx/0x"));
    }

    #[test]
    fn deployment_block_reports_verification_outcome() {
        let result = DeploymentResult {
            contract_address: Some(
                Address::from_str("0xEce5E455A8191E42a2b8162124248cb20Ceea76f").unwrap(),
            ),
            tx_hash: H256::from_low_u64_be(1),
            verification: VerificationStatus::Failed("rate limited".to_string()),
        };
        let block = format_deployment(&explorer(), &result);
        assert!(block.starts_with("✅ Token Deployed Successfully!"));
        assert!(block.contains("🔗 Contract Address: 0xEce5E455A8191E42a2b8162124248cb20Ceea76f"));
        assert!(block.contains("🔗 Explorer Tx: https://testnet.bscscan.com/tx/0x"));
        assert!(block.ends_with("🔴 Verification Failed: rate limited"));
    }

    #[test]
    fn unmined_deployment_reports_pending_receipt() {
        let result = DeploymentResult {
            contract_address: None,
            tx_hash: H256::from_low_u64_be(2),
            verification: VerificationStatus::Skipped,
        };
        let block = format_deployment(&explorer(), &result);
        assert!(block.starts_with("⏳ Deployment Broadcast, Receipt Pending."));
        assert!(block.contains("⏳ Verification Skipped"));
    }

    #[test]
    fn amounts_accept_numbers_and_strings() {
        assert_eq!(amount_text(&json!(1.5)).unwrap(), "1.5");
        assert_eq!(amount_text(&json!("2.25")).unwrap(), "2.25");
        assert!(amount_text(&json!({"x": 1})).is_err());
    }
}
