//! Interactive chat against an OpenAI-compatible `/responses` endpoint.
//!
//! Unlike `ragline-chat`, this variant requires a preexisting API key and
//! talks to the versioned API root (`{base}/api/v1/responses`), identifying
//! the flow to run with `--flow` or `RAGLINE_FLOW_ID`.
//!
//! # Usage
//!
//! ```bash
//! ragline-responses
//! ragline-responses --flow 9a1c2e4d-0000-4000-8000-1234567890ab
//! ragline-responses --no-color
//! ```
//!
//! Type `exit`, `quit`, or `q` to leave.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;

use ragline::ResponsesClient;
use ragline::chat::{ChatArgs, ChatConfig, ChatSession, run_chat_loop};
use ragline::config::Settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("ragline-responses [OPTIONS]");
    let config = ChatConfig::from(args);

    let settings = Settings::from_env()?;
    let api_key = settings.require_api_key()?;
    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| settings.base_url.clone());
    let api_root = format!("{}/api/v1", base_url.trim_end_matches('/'));
    let flow = config.resolve_flow(settings.flow_id.as_deref());

    let client = ResponsesClient::new(&api_root, api_key, &flow)?;
    let mut session = ChatSession::new(client);

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    println!("RAG Chat via responses ({api_root}, flow: {flow})");
    println!("Type exit, quit, or q to leave.\n");

    run_chat_loop(&mut session, config.use_color, interrupted).await?;
    Ok(())
}
