// src/agent/router.rs
//
// Intent routing. The router reads the conversation and picks exactly one of
// three specialist execution paths; it never touches the chain itself. The
// handoff is one-way for the turn.

use crate::agent::tools;
use crate::error::Result;
use crate::llm::{ChatMessage, LlmClient, ToolDef};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Query,
    NativeTransfer,
    ContractTransfer,
}

#[derive(Deserialize)]
struct RoutedIntent {
    intent: Intent,
}

/// A specialist execution path: a role prompt plus the tools it may call.
pub struct Specialist {
    pub name: &'static str,
    pub instructions: &'static str,
    pub tools: Vec<ToolDef>,
}

const ROUTER_INSTRUCTIONS: &str = "\
You interpret the user's intent and silently pick which blockchain specialist
should handle the request. Decide independently without asking the user to
specify.

Specialists:
- query: fetches readable information from the blockchain (balances,
  transaction counts, bytecode, gas price, token balances and details).
- native_transfer: sends native ETH transfers.
- contract_transfer: sends smart contract transactions (ERC20 token transfers,
  allowance approvals, token deployments).

Respond with a JSON object: {\"intent\": \"query\" | \"native_transfer\" | \"contract_transfer\"}.";

const QUERY_INSTRUCTIONS: &str = "\
You are a helpful assistant who fetches readable information from the
blockchain via tool calls.

Critical Instructions:
- For read-only operations, proceed without requiring user confirmation.
- When multiple addresses are requested, call the relevant tool separately for
  each address, one call per address.
- Present tool results to the user without altering their content.
- Display complete bytecode in a code block for readability.";

const NATIVE_TX_INSTRUCTIONS: &str = "\
You are a helpful assistant. Your responsibility is to send native
transactions to the blockchain.

Critical Instructions:
- Write transactions move real assets. The transfer tool does not execute
  immediately: it returns a transaction summary that the user must confirm.
  Present that summary to the user verbatim and ask nothing else.
- When transferring to multiple addresses, call the tool separately for each
  recipient, one call per recipient.";

const CONTRACT_TX_INSTRUCTIONS: &str = "\
You are a helpful assistant. Your responsibility is to send smart contract
transactions to the blockchain.

Critical Instructions:
- Write transactions move real assets or cost gas. The tools do not execute
  immediately: they return a transaction summary that the user must confirm.
  Present that summary to the user verbatim and ask nothing else.
- When transferring or approving for multiple addresses, call the tool
  separately for each address, one call per address.";

/// Ask the model which specialist should handle the conversation.
pub async fn route(llm: &LlmClient, history: &[ChatMessage]) -> Result<Intent> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(ROUTER_INSTRUCTIONS));
    messages.extend_from_slice(history);
    let routed: RoutedIntent = llm.complete_json(&messages).await?;
    Ok(routed.intent)
}

/// Pure mapping from intent to specialist.
pub fn specialist_for(intent: Intent) -> Specialist {
    match intent {
        Intent::Query => Specialist {
            name: "query",
            instructions: QUERY_INSTRUCTIONS,
            tools: tools::query_tools(),
        },
        Intent::NativeTransfer => Specialist {
            name: "native_transfer",
            instructions: NATIVE_TX_INSTRUCTIONS,
            tools: tools::native_tools(),
        },
        Intent::ContractTransfer => Specialist {
            name: "contract_transfer",
            instructions: CONTRACT_TX_INSTRUCTIONS,
            tools: tools::contract_tools(),
        },
    }
}
