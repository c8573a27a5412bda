// src/deploy.rs
//
// Token deployment pipeline: materialize source from validated parameters,
// compile, deploy through the transaction builder, then submit explorer
// verification. Each step is its own failure domain; verification failure is
// reported alongside a successful deployment, never instead of it.

use crate::error::{AgentError, Result};
use crate::explorer::{Explorer, VerifyRequest};
use crate::tx::builder::{TxPayload, TxSubmitter};
use ethers_core::types::{Address, Bytes, H256, U256};
use ethers_solc::{artifacts::Severity, CompilerInput, Solc};
use std::time::Duration;
use tracing::{info, warn};

const SOLC_VERSION: &str = "0.8.29";
const SOLC_VERSION_LONG: &str = "v0.8.29+commit.ab55807c";
const OPTIMIZER_RUNS: u32 = 200;

/// Validated constructor parameters for a new token.
#[derive(Debug, Clone)]
pub struct TokenParams {
    pub recipient: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub initial_supply: u64,
}

impl TokenParams {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AgentError::InvalidParameter("token name is empty".into()));
        }
        // The name becomes part of a Solidity identifier once spaces are
        // stripped, so it must reduce to a valid one.
        let identifier: String = self.name.chars().filter(|c| *c != ' ').collect();
        if identifier.is_empty()
            || !identifier.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            || !identifier.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(AgentError::InvalidParameter(format!(
                "token name '{}' does not reduce to a valid identifier",
                self.name
            )));
        }
        if self.symbol.trim().is_empty() || !self.symbol.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(AgentError::InvalidParameter(format!(
                "token symbol '{}' is not alphanumeric",
                self.symbol
            )));
        }
        if self.decimals == 0 || self.decimals > 36 {
            return Err(AgentError::InvalidParameter(format!(
                "token decimals must be between 1 and 36, got {}",
                self.decimals
            )));
        }
        if self.initial_supply == 0 {
            return Err(AgentError::InvalidParameter(
                "initial supply must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Contract name used in source, compilation output and verification.
    pub fn contract_name(&self) -> String {
        format!("{}Token", self.name.replace(' ', ""))
    }

    /// Total supply in base units.
    pub fn supply_base_units(&self) -> U256 {
        U256::from(self.initial_supply) * U256::from(10u64).pow(U256::from(self.decimals))
    }
}

/// Outcome of the explorer verification step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Verification accepted; carries the explorer submission guid.
    Submitted(String),
    /// Both verification attempts failed; deployment itself still succeeded.
    Failed(String),
    /// Verification was not attempted (no mined contract address yet).
    Skipped,
}

#[derive(Debug, Clone)]
pub struct DeploymentResult {
    /// Unknown when the receipt did not arrive within the timeout; the
    /// transaction may still mine later.
    pub contract_address: Option<Address>,
    pub tx_hash: H256,
    pub verification: VerificationStatus,
}

/// Render the single-file token contract source for the given parameters.
pub fn materialize_source(params: &TokenParams) -> Result<String> {
    params.validate()?;
    let supply = params.supply_base_units();
    Ok(format!(
        r#"// SPDX-License-Identifier: MIT
pragma solidity {solc_version};

contract {contract} {{
    string public constant name = "{name}";
    string public constant symbol = "{symbol}";
    uint8 public constant decimals = {decimals};
    uint256 public constant totalSupply = {supply};

    mapping(address => uint256) private _balances;
    mapping(address => mapping(address => uint256)) private _allowances;

    event Transfer(address indexed from, address indexed to, uint256 value);
    event Approval(address indexed owner, address indexed spender, uint256 value);

    constructor() {{
        _balances[msg.sender] = totalSupply;
        emit Transfer(address(0), msg.sender, totalSupply);
    }}

    function balanceOf(address account) public view returns (uint256) {{
        return _balances[account];
    }}

    function allowance(address owner, address spender) public view returns (uint256) {{
        return _allowances[owner][spender];
    }}

    function transfer(address to, uint256 amount) public returns (bool) {{
        require(to != address(0), "ERC20: transfer to zero address");
        require(_balances[msg.sender] >= amount, "ERC20: insufficient balance");

        _balances[msg.sender] -= amount;
        _balances[to] += amount;
        emit Transfer(msg.sender, to, amount);
        return true;
    }}

    function approve(address spender, uint256 amount) public returns (bool) {{
        require(spender != address(0), "ERC20: approve to zero address");

        _allowances[msg.sender][spender] = amount;
        emit Approval(msg.sender, spender, amount);
        return true;
    }}

    function transferFrom(address from, address to, uint256 amount) public returns (bool) {{
        require(to != address(0), "ERC20: transfer to zero address");
        require(_balances[from] >= amount, "ERC20: insufficient balance");
        require(_allowances[from][msg.sender] >= amount, "ERC20: insufficient allowance");

        _balances[from] -= amount;
        _balances[to] += amount;
        _allowances[from][msg.sender] -= amount;
        emit Transfer(from, to, amount);
        return true;
    }}
}}
"#,
        solc_version = SOLC_VERSION,
        contract = params.contract_name(),
        name = params.name,
        symbol = params.symbol,
        decimals = params.decimals,
        supply = supply,
    ))
}

/// Compile the materialized source with the pinned solc, returning the
/// deployable creation bytecode. A compile error is fatal for this attempt and
/// is never retried.
fn compile(source: &str, contract_name: &str) -> Result<Bytes> {
    let solc = Solc::find_svm_installed_version(SOLC_VERSION)
        .map_err(|e| AgentError::Compile(format!("cannot locate solc {}: {}", SOLC_VERSION, e)))?
        .map(Ok)
        .unwrap_or_else(|| {
            let version = SOLC_VERSION
                .parse()
                .map_err(|e| AgentError::Compile(format!("bad solc version pin: {}", e)))?;
            Solc::blocking_install(&version).map_err(|e| {
                AgentError::Compile(format!("cannot install solc {}: {}", SOLC_VERSION, e))
            })
        })?;

    let dir = tempfile::tempdir()
        .map_err(|e| AgentError::Compile(format!("cannot create build dir: {}", e)))?;
    let path = dir.path().join(format!("{}.sol", contract_name));
    std::fs::write(&path, source)
        .map_err(|e| AgentError::Compile(format!("cannot write source: {}", e)))?;

    let mut inputs = CompilerInput::new(dir.path())
        .map_err(|e| AgentError::Compile(format!("cannot build compiler input: {}", e)))?;
    let mut input = inputs
        .pop()
        .ok_or_else(|| AgentError::Compile("no compilable sources".into()))?;
    input.settings.optimizer.enabled = Some(true);
    input.settings.optimizer.runs = Some(OPTIMIZER_RUNS as usize);

    let output = solc
        .compile(&input)
        .map_err(|e| AgentError::Compile(e.to_string()))?;

    let errors: Vec<String> = output
        .errors
        .iter()
        .filter(|e| e.severity == Severity::Error)
        .map(|e| e.to_string())
        .collect();
    if !errors.is_empty() {
        return Err(AgentError::Compile(errors.join("\n")));
    }

    let contract = output
        .find(contract_name)
        .ok_or_else(|| AgentError::Compile(format!("contract {} not in output", contract_name)))?;
    let (_, bytecode, _) = contract.into_parts();
    bytecode.ok_or_else(|| AgentError::Compile(format!("no bytecode for {}", contract_name)))
}

/// Run the full deployment pipeline.
pub async fn run(
    submitter: &TxSubmitter,
    explorer: &Explorer,
    params: &TokenParams,
    gas_limit: u64,
    receipt_timeout: Duration,
) -> Result<DeploymentResult> {
    // (1) + (2): source and bytecode. Compilation shells out to solc, so it
    // runs on the blocking pool.
    let source = materialize_source(params)?;
    let contract_name = params.contract_name();
    let bytecode = {
        let source = source.clone();
        let name = contract_name.clone();
        tokio::task::spawn_blocking(move || compile(&source, &name))
            .await
            .map_err(|e| AgentError::Compile(format!("compile task failed: {}", e)))??
    };

    // (3): deploy and wait, bounded.
    let tx_hash = submitter.submit(TxPayload::deployment(bytecode, gas_limit)).await?;
    info!(hash = ?tx_hash, "deployment transaction broadcast");

    let contract_address = match submitter.await_receipt(tx_hash, receipt_timeout).await {
        Ok(receipt) => receipt.contract_address,
        Err(AgentError::DeploymentTimeout { .. }) => {
            warn!(hash = ?tx_hash, "deployment receipt not seen within timeout");
            None
        }
        Err(e) => return Err(e),
    };

    // (4): verification, non-fatal.
    let verification = match contract_address {
        Some(address) => {
            let request = VerifyRequest {
                contract_address: address,
                contract_name: &contract_name,
                source: &source,
                compiler_version: SOLC_VERSION_LONG,
                optimization_runs: OPTIMIZER_RUNS,
            };
            match explorer.verify_source(&request).await {
                Ok(guid) => VerificationStatus::Submitted(guid),
                Err(e) => VerificationStatus::Failed(e.to_string()),
            }
        }
        None => VerificationStatus::Skipped,
    };

    Ok(DeploymentResult {
        contract_address,
        tx_hash,
        verification,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn params() -> TokenParams {
        TokenParams {
            recipient: Address::from_str("0xC9654530E08907D0Ea73E17fa8EF8964129A3dB7").unwrap(),
            name: "My Token".to_string(),
            symbol: "MTK".to_string(),
            decimals: 18,
            initial_supply: 1_000_000,
        }
    }

    #[test]
    fn contract_name_strips_spaces() {
        assert_eq!(params().contract_name(), "MyTokenToken");
    }

    #[test]
    fn source_embeds_parameters() {
        let source = materialize_source(&params()).unwrap();
        assert!(source.contains("contract MyTokenToken"));
        assert!(source.contains(r#"string public constant name = "My Token";"#));
        assert!(source.contains(r#"string public constant symbol = "MTK";"#));
        assert!(source.contains("uint8 public constant decimals = 18;"));
        // 1_000_000 * 10^18
        assert!(source.contains("uint256 public constant totalSupply = 1000000000000000000000000;"));
    }

    #[test]
    fn rejects_zero_decimals_and_supply() {
        let mut bad = params();
        bad.decimals = 0;
        assert!(matches!(bad.validate(), Err(AgentError::InvalidParameter(_))));

        let mut bad = params();
        bad.initial_supply = 0;
        assert!(matches!(bad.validate(), Err(AgentError::InvalidParameter(_))));
    }

    #[test]
    fn rejects_names_that_are_not_identifiers() {
        for name in ["", "123 Token", "My-Token", "Tok;en"] {
            let mut bad = params();
            bad.name = name.to_string();
            assert!(
                matches!(bad.validate(), Err(AgentError::InvalidParameter(_))),
                "expected rejection for name {:?}",
                name
            );
        }
    }

    #[test]
    fn rejects_non_alphanumeric_symbols() {
        let mut bad = params();
        bad.symbol = "M T".to_string();
        assert!(matches!(bad.validate(), Err(AgentError::InvalidParameter(_))));
    }

    #[test]
    fn supply_scales_by_decimals() {
        let mut p = params();
        p.decimals = 6;
        p.initial_supply = 5;
        assert_eq!(p.supply_base_units(), U256::from(5_000_000u64));
    }
}
