// src/agent/mod.rs
//
// Turn pipeline: guardrail, then pending-confirmation resolution, then intent
// routing into a specialist tool loop. Write tools only ever propose; the
// sole path to a signed transaction is a confirmed pending action.

pub mod confirm;
pub mod guardrail;
pub mod router;
pub mod specialist;
pub mod tools;

use crate::llm::{ChatMessage, LlmClient};
use confirm::Resolution;
use std::sync::Arc;
use tools::Toolbox;
use tracing::info;

pub struct Agent {
    llm: Arc<LlmClient>,
    toolbox: Toolbox,
}

impl Agent {
    pub fn new(llm: Arc<LlmClient>, toolbox: Toolbox) -> Self {
        Self { llm, toolbox }
    }

    /// Process one user utterance and return the reply. The caller owns the
    /// conversation history; both the utterance and the reply are appended.
    pub async fn handle_turn(&self, history: &mut Vec<ChatMessage>, utterance: &str) -> String {
        let classification = guardrail::classify(&self.llm, history, utterance).await;
        if !classification.is_safe {
            info!(reasoning = %classification.reasoning, "utterance rejected by guardrail");
            let reply = format!(
                "Error: {}",
                crate::error::AgentError::GuardrailRejected(classification.reasoning)
            );
            history.push(ChatMessage::user(utterance));
            history.push(ChatMessage::assistant(reply.clone()));
            return reply;
        }

        history.push(ChatMessage::user(utterance));

        match self.toolbox.resolve_confirmation(utterance).await {
            Resolution::Confirmed(action) => {
                let reply = self.toolbox.execute_confirmed(action).await;
                history.push(ChatMessage::assistant(reply.clone()));
                return reply;
            }
            Resolution::Declined => {
                let reply = "Transaction cancelled. Nothing was sent.".to_string();
                history.push(ChatMessage::assistant(reply.clone()));
                return reply;
            }
            // An unrelated reply drops the pending action and the turn
            // continues as a fresh request.
            Resolution::Expired | Resolution::NonePending => {}
        }

        let reply = match self.run_specialist(history).await {
            Ok(reply) => reply,
            Err(e) => format!("Error: {}", e),
        };
        history.push(ChatMessage::assistant(reply.clone()));
        reply
    }

    async fn run_specialist(&self, history: &[ChatMessage]) -> crate::error::Result<String> {
        let intent = router::route(&self.llm, history).await?;
        info!(?intent, "routing to specialist");
        let specialist = router::specialist_for(intent);
        specialist::run(&self.llm, &self.toolbox, history, &specialist).await
    }

    pub fn toolbox(&self) -> &Toolbox {
        &self.toolbox
    }
}
