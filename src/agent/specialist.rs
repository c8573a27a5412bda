// src/agent/specialist.rs
//
// The per-specialist tool loop. Tool calls are executed strictly in order,
// one at a time; a multi-target request becomes one call per target across
// the loop rounds. The loop is bounded so a misbehaving model cannot spin
// forever.

use crate::agent::router::Specialist;
use crate::agent::tools::Toolbox;
use crate::error::{AgentError, Result};
use crate::llm::{ChatMessage, LlmClient};
use tracing::debug;

const MAX_TOOL_ROUNDS: usize = 8;

/// Run one specialist over the conversation until it produces a final text
/// reply. Tool failures are fed back to the model as results, never raised.
pub async fn run(
    llm: &LlmClient,
    toolbox: &Toolbox,
    history: &[ChatMessage],
    specialist: &Specialist,
) -> Result<String> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(specialist.instructions));
    messages.extend_from_slice(history);

    for round in 0..MAX_TOOL_ROUNDS {
        let reply = llm.chat(&messages, &specialist.tools).await?;
        let calls = reply.tool_calls.clone().unwrap_or_default();
        if calls.is_empty() {
            return Ok(reply.content.unwrap_or_default());
        }

        debug!(specialist = specialist.name, round, calls = calls.len(), "executing tool calls");
        messages.push(reply);
        for call in calls {
            let output = toolbox
                .execute(&call.function.name, &call.function.arguments)
                .await;
            messages.push(ChatMessage::tool_result(call.id, output));
        }
    }

    Err(AgentError::Llm(format!(
        "specialist {} exceeded {} tool rounds without a final reply",
        specialist.name, MAX_TOOL_ROUNDS
    )))
}
