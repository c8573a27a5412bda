// src/error.rs

use thiserror::Error;

/// Error kinds surfaced by the agent core.
///
/// Every tool-level failure is rendered as a descriptive result string for the
/// user; none of these abort a conversation turn.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("request rejected: {0}")]
    GuardrailRejected(String),

    #[error("contract metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("insufficient balance or allowance: {0}")]
    InsufficientFunds(String),

    #[error("nonce conflict: {0}")]
    NonceConflict(String),

    #[error("compile error: {0}")]
    Compile(String),

    #[error("timed out waiting for receipt of transaction {hash}")]
    DeploymentTimeout { hash: String },

    #[error("source verification failed: {0}")]
    VerificationFailed(String),

    #[error("{context}: {message}")]
    Transport { context: String, message: String },

    #[error("language model error: {0}")]
    Llm(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl AgentError {
    /// Wrap a transport-level failure with a human-readable context, so raw
    /// reqwest/serde errors never reach the user unexplained.
    pub fn transport(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        AgentError::Transport {
            context: context.into(),
            message: err.to_string(),
        }
    }

    /// Classify a node reject reason into the dedicated error kinds where the
    /// message makes the cause detectable.
    pub fn from_node_reject(context: &str, message: String) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("nonce too low") || lower.contains("replacement transaction") {
            AgentError::NonceConflict(message)
        } else if lower.contains("insufficient funds") || lower.contains("insufficient balance") {
            AgentError::InsufficientFunds(message)
        } else {
            AgentError::Transport {
                context: context.to_string(),
                message,
            }
        }
    }
}

pub type Result<T, E = AgentError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_reject_classifies_nonce_conflicts() {
        let err = AgentError::from_node_reject("eth_sendRawTransaction", "nonce too low".into());
        assert!(matches!(err, AgentError::NonceConflict(_)));
    }

    #[test]
    fn node_reject_classifies_insufficient_funds() {
        let err = AgentError::from_node_reject(
            "eth_sendRawTransaction",
            "insufficient funds for gas * price + value".into(),
        );
        assert!(matches!(err, AgentError::InsufficientFunds(_)));
    }

    #[test]
    fn node_reject_falls_back_to_transport() {
        let err = AgentError::from_node_reject("eth_call", "execution reverted".into());
        assert!(matches!(err, AgentError::Transport { .. }));
    }
}
