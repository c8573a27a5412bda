// src/agent/guardrail.rs
//
// Prompt safety and scope classification. Runs before anything else each turn
// and fails closed: if the classifier cannot be reached or returns garbage,
// the utterance is treated as unsafe.

use crate::llm::{ChatMessage, LlmClient};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct PromptClassification {
    pub is_safe: bool,
    pub reasoning: String,
}

const GUARDRAIL_INSTRUCTIONS: &str = "\
You analyze the user's prompt to determine if it is valid, safe and within the scope defined.
Only allow execution if the prompt explicitly asks for:

Blockchain Query Operations:
- Fetching ETH balance of a single or multiple account addresses
- Fetching transaction count for a given Ethereum wallet address
- Fetching byte code for a given Ethereum smart contract address
- Fetching current gas price for the blockchain network
- Fetching ERC20 token balance and details for an account
- Fetching ERC20 token information (name, symbol, decimals)

Native Transaction Operations:
- Transferring ETH from one account to another

Smart Contract Operations:
- Transferring ERC20 tokens from one account to another
- Approving ERC20 token allowance for a spender
- Deploying a new ERC20 token to the blockchain with specified parameters

A plain confirmation or cancellation of a previously proposed transaction
(e.g. 'yes', 'no', 'cancel') is also in scope.

Critical Instructions:
- Reject any prompts that suggest harm, violence, or illegal activity
- Reject any prompts that are unrelated to the above blockchain operations
- Be cautious and prioritize safety over leniency

Respond with a JSON object: {\"is_safe\": boolean, \"reasoning\": string}.";

const CONTEXT_WINDOW: usize = 8;

/// Recent user/assistant dialogue, so follow-ups that lean on earlier turns
/// ("do the same for 0xabc...") are judged with the conversation they refer
/// to. Tool traffic and empty messages are not useful to the classifier.
fn context_window(history: &[ChatMessage]) -> Vec<ChatMessage> {
    let relevant: Vec<ChatMessage> = history
        .iter()
        .filter(|m| (m.role == "user" || m.role == "assistant") && m.content.is_some())
        .cloned()
        .collect();
    let start = relevant.len().saturating_sub(CONTEXT_WINDOW);
    relevant[start..].to_vec()
}

/// Classify one utterance against the recent conversation. Never returns an
/// error: any failure along the way is an unsafe classification carrying the
/// failure as reasoning.
pub async fn classify(
    llm: &LlmClient,
    history: &[ChatMessage],
    utterance: &str,
) -> PromptClassification {
    let mut messages = vec![ChatMessage::system(GUARDRAIL_INSTRUCTIONS)];
    messages.extend(context_window(history));
    messages.push(ChatMessage::user(utterance));
    match llm.complete_json::<PromptClassification>(&messages).await {
        Ok(classification) => classification,
        Err(e) => PromptClassification {
            is_safe: false,
            reasoning: format!("Error analyzing prompt: {}", e),
        },
    }
}
