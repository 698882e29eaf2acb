//! Core chat session management.
//!
//! [`ChatSession`] owns the conversation continuation id across turns and
//! drives one streaming request per user input through a [`TurnBackend`].
//! The REPL itself lives in [`run_chat_loop`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::aggregate::{TurnOutput, aggregate_chat_events, aggregate_response_chunks};
use crate::chat::commands::is_exit_command;
use crate::client::ResponsesClient;
use crate::error::{Error, Result};
use crate::observability;
use crate::rag::RagClient;
use crate::render::{LiveFrame, render_frame};

/// A backend that can take one streamed chat turn.
///
/// Implementations send `input` (continuing the conversation identified by
/// `continuation_id` when present), stream the answer through `on_delta`,
/// and return the aggregated turn.
#[async_trait]
pub trait TurnBackend {
    async fn take_turn<F>(
        &self,
        input: &str,
        continuation_id: Option<&str>,
        on_delta: F,
    ) -> Result<TurnOutput>
    where
        F: FnMut(&str) + Send;
}

#[async_trait]
impl TurnBackend for RagClient {
    async fn take_turn<F>(
        &self,
        input: &str,
        continuation_id: Option<&str>,
        on_delta: F,
    ) -> Result<TurnOutput>
    where
        F: FnMut(&str) + Send,
    {
        let events = self.chat_stream(input, continuation_id).await?;
        aggregate_chat_events(events, continuation_id, on_delta).await
    }
}

#[async_trait]
impl TurnBackend for ResponsesClient {
    async fn take_turn<F>(
        &self,
        input: &str,
        continuation_id: Option<&str>,
        on_delta: F,
    ) -> Result<TurnOutput>
    where
        F: FnMut(&str) + Send,
    {
        let chunks = self.stream_response(input, continuation_id).await?;
        aggregate_response_chunks(chunks, on_delta).await
    }
}

/// A chat session: a backend plus the continuation id threading turns
/// together.
pub struct ChatSession<B> {
    backend: B,
    continuation_id: Option<String>,
}

impl<B: TurnBackend> ChatSession<B> {
    /// Creates a session starting a fresh conversation.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            continuation_id: None,
        }
    }

    /// The continuation id the next turn will send, if any.
    pub fn continuation_id(&self) -> Option<&str> {
        self.continuation_id.as_deref()
    }

    /// Forgets the conversation; the next turn starts fresh.
    pub fn reset(&mut self) {
        self.continuation_id = None;
    }

    /// Sends one user input and streams the answer through `on_delta`.
    ///
    /// The stored continuation id is replaced only when the turn succeeds
    /// and produced a non-empty id. A failed turn leaves it untouched, so
    /// the conversation can resume after transient errors.
    pub async fn send_streaming<F>(&mut self, input: &str, on_delta: F) -> Result<TurnOutput>
    where
        F: FnMut(&str) + Send,
    {
        observability::CHAT_TURNS.click();
        let start = Instant::now();
        let result = self
            .backend
            .take_turn(input, self.continuation_id.as_deref(), on_delta)
            .await;
        observability::CHAT_TURN_DURATION.add(start.elapsed().as_secs_f64());

        let output = result?;
        if let Some(id) = output.continuation_id.as_deref() {
            if !id.is_empty() {
                self.continuation_id = Some(id.to_string());
            }
        }
        Ok(output)
    }
}

/// Runs the interactive REPL until the user exits.
///
/// Blank lines are skipped, exit words end the loop, and Ctrl+C or Ctrl+D
/// ends the session, dropping any in-flight turn. Connectivity errors print
/// a retry hint and keep the loop alive.
pub async fn run_chat_loop<B: TurnBackend>(
    session: &mut ChatSession<B>,
    use_color: bool,
    interrupted: Arc<AtomicBool>,
) -> Result<()> {
    let mut rl =
        DefaultEditor::new().map_err(|e| Error::unknown(format!("readline setup failed: {e}")))?;

    loop {
        interrupted.store(false, Ordering::Relaxed);

        match rl.readline("You: ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if is_exit_command(line) {
                    println!("Goodbye!");
                    break;
                }

                let mut frame = LiveFrame::new(use_color);
                let result = {
                    let turn = session.send_streaming(line, |accumulated| {
                        frame.update(&render_frame(accumulated));
                    });
                    tokio::pin!(turn);
                    loop {
                        tokio::select! {
                            result = &mut turn => break Some(result),
                            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                                if interrupted.load(Ordering::Relaxed) {
                                    break None;
                                }
                            }
                        }
                    }
                };
                frame.finish();

                match result {
                    None => {
                        println!("\nInterrupted.");
                        break;
                    }
                    Some(Err(err)) if err.is_connectivity() => {
                        eprintln!("{err}");
                        eprintln!("The backend looks unreachable; try again in a moment.");
                    }
                    Some(Err(err)) => {
                        eprintln!("{err}");
                    }
                    Some(Ok(_)) => {}
                }
                println!();
            }
            Err(ReadlineError::Interrupted) => {
                println!("\nGoodbye!");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Input error: {err}");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedBackend {
        turns: Mutex<VecDeque<Result<TurnOutput>>>,
    }

    impl ScriptedBackend {
        fn new(turns: Vec<Result<TurnOutput>>) -> Self {
            Self {
                turns: Mutex::new(turns.into()),
            }
        }
    }

    #[async_trait]
    impl TurnBackend for ScriptedBackend {
        async fn take_turn<F>(
            &self,
            _input: &str,
            _continuation_id: Option<&str>,
            mut on_delta: F,
        ) -> Result<TurnOutput>
        where
            F: FnMut(&str) + Send,
        {
            let turn = self
                .turns
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted turn available");
            if let Ok(output) = &turn {
                if !output.text.is_empty() {
                    on_delta(&output.text);
                }
            }
            turn
        }
    }

    #[tokio::test]
    async fn successful_turn_updates_continuation_id() {
        let backend = ScriptedBackend::new(vec![Ok(TurnOutput {
            continuation_id: Some("chat-1".to_string()),
            text: "hello".to_string(),
        })]);
        let mut session = ChatSession::new(backend);

        let mut seen = Vec::new();
        let output = session
            .send_streaming("hi", |text| seen.push(text.to_string()))
            .await
            .unwrap();
        assert_eq!(output.text, "hello");
        assert_eq!(session.continuation_id(), Some("chat-1"));
        assert_eq!(seen, vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn failed_turn_leaves_continuation_id_unchanged() {
        let backend = ScriptedBackend::new(vec![
            Ok(TurnOutput {
                continuation_id: Some("chat-1".to_string()),
                text: "first".to_string(),
            }),
            Err(Error::connection("refused", None)),
        ]);
        let mut session = ChatSession::new(backend);

        session.send_streaming("hi", |_| {}).await.unwrap();
        assert_eq!(session.continuation_id(), Some("chat-1"));

        let err = session.send_streaming("again", |_| {}).await.unwrap_err();
        assert!(err.is_connectivity());
        assert_eq!(session.continuation_id(), Some("chat-1"));
    }

    #[tokio::test]
    async fn empty_id_does_not_replace_prior() {
        let backend = ScriptedBackend::new(vec![
            Ok(TurnOutput {
                continuation_id: Some("chat-1".to_string()),
                text: "first".to_string(),
            }),
            Ok(TurnOutput {
                continuation_id: Some(String::new()),
                text: "second".to_string(),
            }),
        ]);
        let mut session = ChatSession::new(backend);

        session.send_streaming("hi", |_| {}).await.unwrap();
        session.send_streaming("more", |_| {}).await.unwrap();
        assert_eq!(session.continuation_id(), Some("chat-1"));
    }

    #[tokio::test]
    async fn reset_starts_fresh() {
        let backend = ScriptedBackend::new(vec![Ok(TurnOutput {
            continuation_id: Some("chat-1".to_string()),
            text: "hello".to_string(),
        })]);
        let mut session = ChatSession::new(backend);
        session.send_streaming("hi", |_| {}).await.unwrap();
        session.reset();
        assert_eq!(session.continuation_id(), None);
    }
}
