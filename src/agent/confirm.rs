// src/agent/confirm.rs
//
// Confirmation gate for value-moving actions. A write tool never submits a
// transaction directly: it registers the action here and the user's next
// reply decides its fate. At most one action is pending per conversation.

use crate::chain::address;
use crate::chain::erc20::TokenMetadata;
use crate::deploy::TokenParams;
use ethers_core::types::{Address, U256};

/// A value-moving action awaiting explicit user confirmation.
#[derive(Debug, Clone)]
pub enum PendingAction {
    TransferEth {
        to: Address,
        amount: String,
        value_wei: U256,
    },
    TransferToken {
        token: TokenMetadata,
        to: Address,
        amount: String,
        base_units: U256,
    },
    ApproveToken {
        token: TokenMetadata,
        spender: Address,
        amount: String,
        base_units: U256,
    },
    DeployToken(TokenParams),
}

impl PendingAction {
    /// Deterministic summary presented verbatim to the user.
    pub fn summary(&self) -> String {
        let body = match self {
            PendingAction::TransferEth { to, amount, .. } => format!(
                "Action: Transfer ETH\nTo: {}\nAmount: {} ETH",
                address::checksum(*to),
                amount
            ),
            PendingAction::TransferToken {
                token,
                to,
                amount,
                base_units,
            } => format!(
                "Action: Transfer Token\nToken: {} ({}) at {}\nTo: {}\nAmount: {} {} ({} base units)",
                token.name,
                token.symbol,
                address::checksum(token.address),
                address::checksum(*to),
                amount,
                token.symbol,
                base_units
            ),
            PendingAction::ApproveToken {
                token,
                spender,
                amount,
                base_units,
            } => format!(
                "Action: Approve Token Allowance\nToken: {} ({}) at {}\nSpender: {}\nAllowance: {} {} ({} base units)",
                token.name,
                token.symbol,
                address::checksum(token.address),
                address::checksum(*spender),
                amount,
                token.symbol,
                base_units
            ),
            PendingAction::DeployToken(params) => format!(
                "Action: Deploy ERC20 Token\nToken Name: {}\nToken Symbol: {}\nToken Decimals: {}\nInitial Supply: {}\nRecipient: {}",
                params.name,
                params.symbol,
                params.decimals,
                params.initial_supply,
                address::checksum(params.recipient)
            ),
        };
        format!(
            "Transaction Summary\n{}\nReply 'yes' to confirm or 'no' to cancel.",
            body
        )
    }
}

/// Outcome of matching a user reply against the pending action.
#[derive(Debug)]
pub enum Resolution {
    /// Affirmative reply; the action is released to the executor exactly once.
    Confirmed(PendingAction),
    /// Negative reply; the action is dropped.
    Declined,
    /// Unrelated reply; the action is dropped and the turn proceeds normally.
    Expired,
    NonePending,
}

#[derive(Default)]
pub struct ConfirmationGate {
    pending: Option<PendingAction>,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action, replacing any earlier pending one, and return the
    /// summary to present to the user.
    pub fn propose(&mut self, action: PendingAction) -> String {
        let summary = action.summary();
        self.pending = Some(action);
        summary
    }

    /// Match the user's reply against the pending action. Whatever the
    /// outcome, the gate is empty afterwards: a declined or expired action is
    /// never retried without a fresh proposal.
    pub fn resolve(&mut self, reply: &str) -> Resolution {
        let Some(action) = self.pending.take() else {
            return Resolution::NonePending;
        };
        if is_affirmative(reply) {
            Resolution::Confirmed(action)
        } else if is_negative(reply) {
            Resolution::Declined
        } else {
            Resolution::Expired
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

fn normalized(reply: &str) -> String {
    reply
        .trim()
        .trim_end_matches(['.', '!'])
        .to_ascii_lowercase()
}

fn is_affirmative(reply: &str) -> bool {
    matches!(
        normalized(reply).as_str(),
        "yes" | "y" | "yep" | "yeah" | "ok" | "okay" | "confirm" | "confirmed" | "sure"
            | "proceed" | "go ahead" | "do it" | "send it"
    )
}

fn is_negative(reply: &str) -> bool {
    matches!(
        normalized(reply).as_str(),
        "no" | "n" | "nope" | "cancel" | "stop" | "abort" | "don't" | "do not" | "decline"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn action() -> PendingAction {
        PendingAction::TransferEth {
            to: Address::from_str("0xDA616Cf8f1114dcC4acfb76Efc9b23DCF2DeB54a").unwrap(),
            amount: "1.5".to_string(),
            value_wei: U256::exp10(18) + U256::exp10(17) * 5,
        }
    }

    #[test]
    fn affirmative_reply_releases_the_action_once() {
        let mut gate = ConfirmationGate::new();
        gate.propose(action());
        assert!(matches!(gate.resolve("Yes!"), Resolution::Confirmed(_)));
        // Released exactly once.
        assert!(matches!(gate.resolve("yes"), Resolution::NonePending));
    }

    #[test]
    fn negative_reply_drops_the_action() {
        let mut gate = ConfirmationGate::new();
        gate.propose(action());
        assert!(matches!(gate.resolve("no"), Resolution::Declined));
        assert!(!gate.has_pending());
    }

    #[test]
    fn unrelated_reply_expires_the_action() {
        let mut gate = ConfirmationGate::new();
        gate.propose(action());
        assert!(matches!(
            gate.resolve("what is the gas price?"),
            Resolution::Expired
        ));
        assert!(!gate.has_pending());
    }

    #[test]
    fn new_proposal_replaces_the_pending_one() {
        let mut gate = ConfirmationGate::new();
        gate.propose(action());
        let second = PendingAction::TransferEth {
            to: Address::from_str("0xC9654530E08907D0Ea73E17fa8EF8964129A3dB7").unwrap(),
            amount: "2".to_string(),
            value_wei: U256::exp10(18) * 2,
        };
        gate.propose(second);
        match gate.resolve("yes") {
            Resolution::Confirmed(PendingAction::TransferEth { amount, .. }) => {
                assert_eq!(amount, "2")
            }
            other => panic!("unexpected resolution: {:?}", other),
        }
    }

    #[test]
    fn summary_names_every_transfer_detail() {
        let summary = action().summary();
        assert!(summary.contains("Transfer ETH"));
        assert!(summary.contains("0xDA616Cf8f1114dcC4acfb76Efc9b23DCF2DeB54a"));
        assert!(summary.contains("1.5 ETH"));
        assert!(summary.contains("Reply 'yes' to confirm"));
    }
}
