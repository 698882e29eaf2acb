//! Stream aggregation for a single chat turn.
//!
//! This is the heart of the client: consuming a chunk/event sequence from one
//! of the two backends, accumulating assistant text, capturing the
//! conversation continuation id, and classifying terminal versus
//! transient-error conditions.
//!
//! Policies, shared by both wire shapes:
//!
//! - Accumulated text is append-only within a turn; the `on_delta` callback
//!   fires synchronously with the full accumulated text for every delta that
//!   changes it.
//! - Continuation-id capture takes the first non-null id observed during the
//!   stream; a later null (or different) value never overwrites it. A stream
//!   that never produces an id yields the caller-supplied fallback.
//! - Malformed chunks are skipped, never fatal.
//! - A terminal signal (`status == "completed"` or a `done` event) stops
//!   consumption immediately; natural end of the sequence also terminates.
//! - If the transport fails after at least one content delta was
//!   accumulated, the turn returns the accumulated text instead of raising.
//!   With zero prior content the error propagates.

use futures::{Stream, StreamExt, pin_mut};

use crate::error::{Error, Result};
use crate::event::{ChatEvent, ResponseChunk, StreamEvent};
use crate::observability;

/// The result of one aggregated turn.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutput {
    /// Continuation id for the next request, if one was observed (or carried
    /// over from the previous turn). `None` means the next turn starts a
    /// fresh conversation.
    pub continuation_id: Option<String>,
    /// The complete accumulated assistant text.
    pub text: String,
}

/// Error-message fragments that indicate the backend closed the connection
/// after delivering its content, which some transports report as a failure.
///
/// This is a heuristic, matched case-insensitively as substrings in exactly
/// one place. The phrases are specific to the backend's transport stack and
/// may need updating if it changes its error text; do not broaden the set
/// without a captured reproduction.
const RECOVERABLE_DISCONNECT_PHRASES: &[&str] = &["peer closed", "incomplete chunked"];

/// Returns true if `err` looks like a connection that closed after content
/// was delivered (see [`RECOVERABLE_DISCONNECT_PHRASES`]).
pub fn is_recoverable_disconnect(err: &Error) -> bool {
    let text = err.to_string().to_lowercase();
    RECOVERABLE_DISCONNECT_PHRASES
        .iter()
        .any(|phrase| text.contains(phrase))
}

#[derive(Default)]
struct TurnState {
    text: String,
    continuation_id: Option<String>,
}

enum Applied {
    Continue,
    Terminal,
    Failed(String),
}

impl TurnState {
    /// First-non-null capture: a later null or different id never overwrites.
    fn observe_id(&mut self, id: Option<&str>) {
        if self.continuation_id.is_none() {
            if let Some(id) = id {
                if !id.is_empty() {
                    self.continuation_id = Some(id.to_string());
                }
            }
        }
    }

    fn apply<F: FnMut(&str)>(&mut self, event: StreamEvent, on_delta: &mut F) -> Applied {
        match event {
            StreamEvent::Content {
                delta,
                continuation_id,
            } => {
                self.observe_id(continuation_id.as_deref());
                if !delta.is_empty() {
                    self.text.push_str(&delta);
                    observability::STREAM_DELTAS.click();
                    on_delta(&self.text);
                }
                Applied::Continue
            }
            StreamEvent::Done { continuation_id } => {
                self.observe_id(continuation_id.as_deref());
                Applied::Terminal
            }
            StreamEvent::Error { message } => Applied::Failed(message),
        }
    }

    fn into_output(self, fallback: Option<&str>) -> TurnOutput {
        TurnOutput {
            continuation_id: self
                .continuation_id
                .or_else(|| fallback.map(String::from)),
            text: self.text,
        }
    }
}

/// Either propagates `err` (no content yet) or downgrades it to success with
/// whatever text and continuation id were accumulated before the failure.
fn fail_or_recover(state: TurnState, err: Error, fallback: Option<&str>) -> Result<TurnOutput> {
    if state.text.is_empty() {
        observability::STREAM_ERRORS.click();
        return Err(err);
    }
    if is_recoverable_disconnect(&err) {
        observability::RECOVERED_DISCONNECTS.click();
    } else {
        observability::STREAM_ERRORS.click();
    }
    Ok(state.into_output(fallback))
}

/// Aggregates a poll-shape chunk stream from the responses endpoint.
///
/// `on_delta` receives the full accumulated text after each change.
pub async fn aggregate_response_chunks<S, F>(chunks: S, mut on_delta: F) -> Result<TurnOutput>
where
    S: Stream<Item = Result<ResponseChunk>>,
    F: FnMut(&str),
{
    pin_mut!(chunks);
    let mut state = TurnState::default();
    'outer: while let Some(item) = chunks.next().await {
        match item {
            Ok(chunk) => {
                for event in chunk.normalize() {
                    match state.apply(event, &mut on_delta) {
                        Applied::Continue => {}
                        Applied::Terminal => break 'outer,
                        Applied::Failed(message) => {
                            let err = Error::streaming(format!("stream error: {message}"), None);
                            return fail_or_recover(state, err, None);
                        }
                    }
                }
            }
            Err(err) if err.is_serialization() => {
                observability::STREAM_MALFORMED.click();
            }
            Err(err) => return fail_or_recover(state, err, None),
        }
    }
    Ok(state.into_output(None))
}

/// Aggregates an event-shape stream from the RAG backend's chat endpoint.
///
/// `prior_chat_id` is returned unchanged when the stream never produces its
/// own continuation id, preserving conversation continuity across turns whose
/// `done` event was lost to a transient disconnect.
pub async fn aggregate_chat_events<S, F>(
    events: S,
    prior_chat_id: Option<&str>,
    mut on_delta: F,
) -> Result<TurnOutput>
where
    S: Stream<Item = Result<ChatEvent>>,
    F: FnMut(&str),
{
    pin_mut!(events);
    let mut state = TurnState::default();
    while let Some(item) = events.next().await {
        match item {
            Ok(event) => {
                let Some(event) = event.normalize() else {
                    continue;
                };
                match state.apply(event, &mut on_delta) {
                    Applied::Continue => {}
                    Applied::Terminal => break,
                    Applied::Failed(message) => {
                        let err = Error::streaming(format!("stream error: {message}"), None);
                        return fail_or_recover(state, err, prior_chat_id);
                    }
                }
            }
            Err(err) if err.is_serialization() => {
                observability::STREAM_MALFORMED.click();
            }
            Err(err) => return fail_or_recover(state, err, prior_chat_id),
        }
    }
    Ok(state.into_output(prior_chat_id))
}
