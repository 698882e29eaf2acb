//! Interactive chat against a RAG backend's streaming chat endpoint.
//!
//! On first run against a fresh backend this binary provisions an API key
//! via `POST /keys` and, when configuration came from a `.env` file, writes
//! the key back to that file.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with RAGLINE_BASE_URL from the environment or .env
//! ragline-chat
//!
//! # Point at a different backend
//! ragline-chat --base-url http://rag.internal:3000
//!
//! # Disable colors (useful for piping output)
//! ragline-chat --no-color
//! ```
//!
//! Type `exit`, `quit`, or `q` to leave.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;

use ragline::chat::{ChatArgs, ChatConfig, ChatSession, run_chat_loop};
use ragline::config::{API_KEY_VAR, Settings};
use ragline::{RagClient, env_file};

/// Returns the configured API key, provisioning a fresh one when absent.
async fn get_or_create_api_key(
    settings: &Settings,
    base_url: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(key) = settings.api_key.as_deref() {
        return Ok(key.to_string());
    }

    println!("No API key configured; requesting one from {base_url} ...");
    let key = RagClient::provision_api_key(base_url, "ragline-chat").await?;

    match settings.env_path() {
        Some(path) => {
            env_file::update_key(path, API_KEY_VAR, &key)?;
            println!("Saved new API key to {}", path.display());
        }
        None => {
            println!("New API key: {key}");
            println!("Add {API_KEY_VAR}={key} to your environment or .env file to persist it.");
        }
    }
    Ok(key)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("ragline-chat [OPTIONS]");
    let config = ChatConfig::from(args);

    let settings = Settings::from_env()?;
    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| settings.base_url.clone());

    let api_key = get_or_create_api_key(&settings, &base_url).await?;
    let client = RagClient::new(&base_url, &api_key)?;
    let mut session = ChatSession::new(client);

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    println!("RAG Chat ({base_url})");
    println!("Type exit, quit, or q to leave.\n");

    run_chat_loop(&mut session, config.use_color, interrupted).await?;
    Ok(())
}
