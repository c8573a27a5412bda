// src/chain/erc20.rs
//
// Encoding and decoding for the standard fungible-token interface. All token
// operations are gated on a resolved ABI: if the ABI does not expose the
// function we are about to call, that is a hard metadata failure, never a
// silent guess.

use crate::chain::client::ChainClient;
use crate::error::{AgentError, Result};
use dashmap::DashMap;
use ethers_core::abi::{decode, encode, Abi, ParamType, Token};
use ethers_core::types::{Address, Bytes, U256};
use ethers_core::utils::keccak256;

/// Token identity and unit information, fetched from the chain via contract
/// calls. Immutable once deployed, so cacheable for the process lifetime.
#[derive(Debug, Clone)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub address: Address,
}

fn selector(sig: &str) -> [u8; 4] {
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&keccak256(sig.as_bytes())[0..4]);
    sel
}

fn encode_call(sig: &str, tokens: Vec<Token>) -> Bytes {
    let mut out = selector(sig).to_vec();
    let mut tail = encode(&tokens);
    out.append(&mut tail);
    Bytes::from(out)
}

fn decode_string(bytes: &[u8]) -> Option<String> {
    if let Ok(tokens) = decode(&[ParamType::String], bytes) {
        if let Some(Token::String(s)) = tokens.first() {
            return Some(s.clone());
        }
    }
    // Some legacy tokens return bytes32 for name/symbol.
    if let Ok(tokens) = decode(&[ParamType::FixedBytes(32)], bytes) {
        if let Some(Token::FixedBytes(b)) = tokens.first() {
            return String::from_utf8(b.iter().copied().take_while(|c| *c != 0u8).collect()).ok();
        }
    }
    None
}

fn decode_u256(bytes: &[u8]) -> Option<U256> {
    if let Ok(tokens) = decode(&[ParamType::Uint(256)], bytes) {
        if let Some(Token::Uint(n)) = tokens.first() {
            return Some(*n);
        }
    }
    None
}

/// decimals() is declared uint8; the call result is contract-controlled, so
/// anything wider than that domain marks the token as unusable rather than
/// being cast blindly.
fn validate_decimals(value: U256, token: Address) -> Result<u32> {
    if value > U256::from(u8::MAX) {
        return Err(AgentError::MetadataUnavailable(format!(
            "decimals() of {:?} is out of range: {}",
            token, value
        )));
    }
    Ok(value.low_u32())
}

/// Confirm the resolved ABI exposes a function before encoding a call to it.
fn require_function(abi: &Abi, name: &str, token: Address) -> Result<()> {
    if abi.functions().any(|f| f.name == name) {
        Ok(())
    } else {
        Err(AgentError::MetadataUnavailable(format!(
            "ABI for {:?} does not expose {}()",
            token, name
        )))
    }
}

/// Fetch name, symbol and decimals for a token contract.
pub async fn metadata(chain: &ChainClient, abi: &Abi, token: Address) -> Result<TokenMetadata> {
    for function in ["name", "symbol", "decimals"] {
        require_function(abi, function, token)?;
    }

    let name_raw = chain.call(token, &encode_call("name()", vec![])).await?;
    let symbol_raw = chain.call(token, &encode_call("symbol()", vec![])).await?;
    let decimals_raw = chain.call(token, &encode_call("decimals()", vec![])).await?;

    let name = decode_string(&name_raw).ok_or_else(|| {
        AgentError::MetadataUnavailable(format!("cannot decode name() of {:?}", token))
    })?;
    let symbol = decode_string(&symbol_raw).ok_or_else(|| {
        AgentError::MetadataUnavailable(format!("cannot decode symbol() of {:?}", token))
    })?;
    let decimals = decode_u256(&decimals_raw).ok_or_else(|| {
        AgentError::MetadataUnavailable(format!("cannot decode decimals() of {:?}", token))
    })?;
    let decimals = validate_decimals(decimals, token)?;

    Ok(TokenMetadata {
        name,
        symbol,
        decimals,
        address: token,
    })
}

/// Token balance of an owner account.
pub async fn balance_of(
    chain: &ChainClient,
    abi: &Abi,
    token: Address,
    owner: Address,
) -> Result<U256> {
    require_function(abi, "balanceOf", token)?;
    let raw = chain
        .call(
            token,
            &encode_call("balanceOf(address)", vec![Token::Address(owner)]),
        )
        .await?;
    decode_u256(&raw).ok_or_else(|| {
        AgentError::MetadataUnavailable(format!("cannot decode balanceOf() of {:?}", token))
    })
}

/// Calldata for `transfer(to, amount)`.
pub fn transfer_calldata(abi: &Abi, token: Address, to: Address, amount: U256) -> Result<Bytes> {
    require_function(abi, "transfer", token)?;
    Ok(encode_call(
        "transfer(address,uint256)",
        vec![Token::Address(to), Token::Uint(amount)],
    ))
}

/// Calldata for `approve(spender, amount)`.
pub fn approve_calldata(
    abi: &Abi,
    token: Address,
    spender: Address,
    amount: U256,
) -> Result<Bytes> {
    require_function(abi, "approve", token)?;
    Ok(encode_call(
        "approve(address,uint256)",
        vec![Token::Address(spender), Token::Uint(amount)],
    ))
}

/// Process-lifetime cache of token metadata, keyed by token address.
#[derive(Default)]
pub struct MetadataCache {
    inner: DashMap<Address, TokenMetadata>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_fetch(
        &self,
        chain: &ChainClient,
        abi: &Abi,
        token: Address,
    ) -> Result<TokenMetadata> {
        if let Some(cached) = self.inner.get(&token) {
            return Ok(cached.clone());
        }
        // Only successful lookups are cached; errors always propagate.
        let fetched = metadata(chain, abi, token).await?;
        self.inner.insert(token, fetched.clone());
        Ok(fetched)
    }
}
