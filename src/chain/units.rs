// src/chain/units.rs
//
// Amount conversions. The native asset always uses the fixed 18-decimal wei
// unit; token amounts always use the decimals declared by the token contract.
// The two paths are deliberately separate and must stay that way.

use crate::error::{AgentError, Result};
use ethers_core::types::U256;
use ethers_core::utils::{format_units, parse_units};

const WEI_PER_ETH_5DP: u64 = 10_000_000_000_000; // 10^13, one 5-decimal step
const NATIVE_DECIMALS: u32 = 18;

/// Parse a human-readable ETH amount into wei.
pub fn eth_to_wei(amount: &str) -> Result<U256> {
    to_base_units(amount, NATIVE_DECIMALS)
}

/// Parse a human-readable decimal amount into token base units, using the
/// token's declared decimals.
pub fn to_base_units(amount: &str, decimals: u32) -> Result<U256> {
    let trimmed = amount.trim();
    if trimmed.starts_with('-') {
        return Err(AgentError::InvalidParameter(format!(
            "amount must be non-negative, got '{}'",
            trimmed
        )));
    }
    let parsed = parse_units(trimmed, decimals).map_err(|e| {
        AgentError::InvalidParameter(format!("cannot parse amount '{}': {}", trimmed, e))
    })?;
    Ok(parsed.into())
}

/// Render token base units as a decimal string using the token's declared
/// decimals, with trailing zeros trimmed.
pub fn from_base_units(value: U256, decimals: u32) -> String {
    let full = format_units(value, decimals).unwrap_or_else(|_| value.to_string());
    match full.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                whole.to_string()
            } else {
                format!("{}.{}", whole, frac)
            }
        }
        None => full,
    }
}

/// Format a wei balance with exactly five decimal places, rounding half-up.
/// This is part of the outward text contract for native balance queries.
pub fn wei_to_eth_5dp(wei: U256) -> String {
    let step = U256::from(WEI_PER_ETH_5DP);
    // Saturating: the half-step bump must not overflow for balances near the
    // top of the 256-bit range.
    let scaled = wei.saturating_add(step / 2) / step;
    let whole = scaled / U256::from(100_000u64);
    let frac = scaled % U256::from(100_000u64);
    format!("{}.{:05}", whole, frac.as_u64())
}

/// Render a wei gas price in gwei, trimming trailing zeros.
pub fn wei_to_gwei(wei: U256) -> String {
    from_base_units(wei, 9)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_amount_uses_declared_decimals() {
        // 1.5 tokens at 6 decimals is 1_500_000 base units.
        assert_eq!(to_base_units("1.5", 6).unwrap(), U256::from(1_500_000u64));
    }

    #[test]
    fn native_amount_uses_fixed_18_decimals() {
        assert_eq!(
            eth_to_wei("1.5").unwrap(),
            U256::from(1_500_000_000_000_000_000u64)
        );
    }

    #[test]
    fn base_unit_round_trip() {
        for (raw, decimals) in [
            (0u64, 6u32),
            (1, 6),
            (1_500_000, 6),
            (1_000_000_000_000_000_000, 18),
            (123_456_789, 8),
        ] {
            let value = U256::from(raw);
            let rendered = from_base_units(value, decimals);
            assert_eq!(
                to_base_units(&rendered, decimals).unwrap(),
                value,
                "round trip failed for {} at {} decimals",
                raw,
                decimals
            );
        }
    }

    #[test]
    fn zero_wei_formats_with_five_decimals() {
        assert_eq!(wei_to_eth_5dp(U256::zero()), "0.00000");
    }

    #[test]
    fn five_decimal_formatting() {
        // 1.5 ETH
        assert_eq!(
            wei_to_eth_5dp(U256::from(1_500_000_000_000_000_000u64)),
            "1.50000"
        );
        // Sub-step dust rounds half-up at the fifth decimal.
        assert_eq!(wei_to_eth_5dp(U256::from(123_456_000_000_000u64)), "0.00012");
        assert_eq!(wei_to_eth_5dp(U256::from(125_000_000_000_000u64)), "0.00013");
    }

    #[test]
    fn extreme_balances_still_format() {
        let rendered = wei_to_eth_5dp(U256::MAX);
        let (_, frac) = rendered.split_once('.').unwrap();
        assert_eq!(frac.len(), 5);
    }

    #[test]
    fn gwei_rendering_trims_zeros() {
        assert_eq!(wei_to_gwei(U256::from(3_000_000_000u64)), "3");
        assert_eq!(wei_to_gwei(U256::from(3_500_000_000u64)), "3.5");
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(matches!(
            to_base_units("-1", 18),
            Err(AgentError::InvalidParameter(_))
        ));
    }

    #[test]
    fn from_base_units_trims_trailing_zeros() {
        assert_eq!(from_base_units(U256::from(1_200_500_000u64), 6), "1200.5");
        assert_eq!(from_base_units(U256::from(1_200_000_000u64), 6), "1200");
    }
}
