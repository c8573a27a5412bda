// src/main.rs

use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use web3_agent::config::Config;
use web3_agent::llm::ChatMessage;
use web3_agent::{AppState, U256};

/// Line-oriented chat loop on stdin/stdout. One line in, one reply out; the
/// conversation history lives for the process lifetime.
async fn run_chat_loop(state: AppState) {
    let agent = state.agent();
    let mut history: Vec<ChatMessage> = Vec::new();

    let mut stdin = io::BufReader::new(io::stdin());
    let mut stdout = io::stdout();

    let _ = stdout
        .write_all(b"Welcome to Web3 Agent Chatbot!\n")
        .await;

    loop {
        let mut line = String::new();
        match stdin.read_line(&mut line).await {
            Ok(0) => {
                info!("EOF received, shutting down");
                break;
            }
            Ok(_) => {
                let utterance = line.trim();
                if utterance.is_empty() {
                    continue;
                }

                let reply = agent.handle_turn(&mut history, utterance).await;
                if let Err(e) = stdout.write_all(format!("{}\n", reply).as_bytes()).await {
                    error!("Failed to write reply: {}", e);
                    break;
                }
                let _ = stdout.flush().await;
            }
            Err(e) => {
                error!("Failed to read from stdin: {}", e);
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout stays clean for the chat loop.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "web3_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("❌ Failed to load configuration: {}", e);
            return;
        }
    };

    let state = match AppState::from_config(config) {
        Ok(state) => state,
        Err(e) => {
            error!("❌ Failed to initialize components: {}", e);
            return;
        }
    };

    // Refuse to start if the endpoint serves a different chain than the one
    // the signer is configured for.
    match state.chain.chain_id().await {
        Ok(reported) if reported != U256::from(state.config.chain_id) => {
            error!(
                configured = state.config.chain_id,
                reported = %reported,
                "❌ CHAIN_ID does not match the chain served by RPC_URL"
            );
            return;
        }
        Ok(_) => {}
        Err(e) => warn!("could not verify node chain id: {}", e),
    }

    info!(chain_id = state.config.chain_id, "agent ready");
    run_chat_loop(state).await;
}
