// Public modules
pub mod aggregate;
pub mod chat;
pub mod client;
pub mod config;
pub mod env_file;
pub mod error;
pub mod event;
pub mod observability;
pub mod rag;
pub mod render;
pub mod sse;

// Re-exports
pub use aggregate::{TurnOutput, aggregate_chat_events, aggregate_response_chunks};
pub use client::ResponsesClient;
pub use config::Settings;
pub use error::{Error, Result};
pub use rag::RagClient;
