// src/chain/address.rs

use crate::error::{AgentError, Result};
use ethers_core::types::Address;
use ethers_core::utils::to_checksum;
use std::str::FromStr;

/// Parse a user-supplied account address.
///
/// Malformed input is a hard error surfaced before any network call is made.
pub fn parse(input: &str) -> Result<Address> {
    let trimmed = input.trim();
    Address::from_str(trimmed).map_err(|_| AgentError::InvalidAddress(trimmed.to_string()))
}

/// EIP-55 checksummed textual form of an address. All outward-facing text uses
/// this form.
pub fn checksum(address: Address) -> String {
    to_checksum(&address, None)
}

/// Parse and normalize in one step, returning both the binary address and its
/// checksummed rendering.
pub fn normalize(input: &str) -> Result<(Address, String)> {
    let address = parse(input)?;
    Ok((address, checksum(address)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_eip55_checksum() {
        // Test vector from the EIP-55 specification.
        let (_, checksummed) = normalize("0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359").unwrap();
        assert_eq!(checksummed, "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359");
    }

    #[test]
    fn accepts_mixed_case_input() {
        let (a, _) = normalize("0xFB6916095CA1DF60BB79CE92CE3EA74C37C5D359").unwrap();
        let (b, _) = normalize("0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["", "0x123", "not-an-address", "0xZZ6916095ca1df60bb79ce92ce3ea74c37c5d359"] {
            match parse(bad) {
                Err(AgentError::InvalidAddress(_)) => {}
                other => panic!("expected InvalidAddress for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert!(parse(" 0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359 ").is_ok());
    }
}
