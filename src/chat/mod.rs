//! Chat application module for interactive conversations with a RAG backend.
//!
//! This module provides a streaming REPL chat interface built on top of the
//! ragline client library:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: session state, the turn backend seam, and the REPL loop
//! - [`commands`]: exit-word recognition

mod commands;
mod config;
mod session;

pub use commands::is_exit_command;
pub use config::{ChatArgs, ChatConfig, DEFAULT_FLOW_ID};
pub use session::{ChatSession, TurnBackend, run_chat_loop};
