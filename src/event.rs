//! Wire shapes for the two supported backends and the normalized event union.
//!
//! Each backend variant gets its own serde type, selected by which client
//! issued the request. There is no runtime shape probing: a chunk decodes as
//! exactly one schema, and both schemas normalize into [`StreamEvent`] before
//! the aggregator sees them.

use serde::Deserialize;

/// One chunk from the OpenAI-compatible responses endpoint (poll shape).
///
/// Chunks carry an optional top-level `id`, an optional `delta` that is a
/// plain string or an object with a `content` key, and an optional `status`
/// whose `"completed"` value is an explicit terminal signal.
#[derive(Clone, Debug, Deserialize)]
pub struct ResponseChunk {
    /// Continuation id for the conversation thread.
    #[serde(default)]
    pub id: Option<String>,
    /// Incremental text payload, in either of the two observed forms.
    #[serde(default)]
    pub delta: Option<DeltaPayload>,
    /// Chunk status; `"completed"` ends the stream.
    #[serde(default)]
    pub status: Option<String>,
}

/// The two delta encodings the responses endpoint emits.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum DeltaPayload {
    /// `"delta": "text"`
    Text(String),
    /// `"delta": {"content": "text", ...}`
    Object {
        #[serde(default)]
        content: Option<String>,
    },
}

impl ResponseChunk {
    /// Extracts the text fragment from either delta encoding.
    pub fn delta_text(&self) -> Option<&str> {
        match &self.delta {
            Some(DeltaPayload::Text(text)) => Some(text.as_str()),
            Some(DeltaPayload::Object { content }) => content.as_deref(),
            None => None,
        }
    }

    /// Returns true if this chunk carries the explicit terminal signal.
    pub fn is_terminal(&self) -> bool {
        self.status.as_deref() == Some("completed")
    }
}

/// One event from the RAG backend's chat stream (event shape).
///
/// The `type` field discriminates; unknown types (e.g. future additions)
/// decode as [`ChatEvent::Other`] and are ignored by the aggregator.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Incremental assistant text.
    Content {
        #[serde(default)]
        delta: Option<String>,
    },
    /// Terminal signal carrying the conversation continuation id.
    Done {
        #[serde(default)]
        chat_id: Option<String>,
    },
    /// In-band error from the backend.
    Error {
        #[serde(default)]
        error: Option<String>,
    },
    /// Retrieval sources attached to the answer. Not rendered by this client.
    Sources {
        #[serde(default)]
        sources: serde_json::Value,
    },
    /// Any event type this client does not know about.
    #[serde(other)]
    Other,
}

/// The normalized stream event both wire shapes reduce to.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// A text fragment, with the continuation id if this chunk carried one.
    Content {
        delta: String,
        continuation_id: Option<String>,
    },
    /// Explicit terminal signal with the final continuation id, if any.
    Done { continuation_id: Option<String> },
    /// In-band error reported by the backend.
    Error { message: String },
}

impl ResponseChunk {
    /// Normalizes a poll-shape chunk. A single chunk can yield a content
    /// event, a terminal event, or both (delta plus `status == "completed"`).
    pub fn normalize(self) -> Vec<StreamEvent> {
        let mut events = Vec::with_capacity(2);
        let terminal = self.is_terminal();
        let id = self.id.clone();
        if let Some(delta) = self.delta_text() {
            if !delta.is_empty() {
                events.push(StreamEvent::Content {
                    delta: delta.to_string(),
                    continuation_id: id.clone(),
                });
            }
        }
        if terminal {
            events.push(StreamEvent::Done {
                continuation_id: id,
            });
        } else if events.is_empty() && self.id.is_some() {
            // Id-only chunk: surface the id without text so first-non-null
            // capture still sees it.
            events.push(StreamEvent::Content {
                delta: String::new(),
                continuation_id: self.id,
            });
        }
        events
    }
}

impl ChatEvent {
    /// Normalizes an event-shape event. `sources` and unknown types map to
    /// nothing.
    pub fn normalize(self) -> Option<StreamEvent> {
        match self {
            ChatEvent::Content { delta } => Some(StreamEvent::Content {
                delta: delta.unwrap_or_default(),
                continuation_id: None,
            }),
            ChatEvent::Done { chat_id } => Some(StreamEvent::Done {
                continuation_id: chat_id,
            }),
            ChatEvent::Error { error } => Some(StreamEvent::Error {
                message: error.unwrap_or_else(|| "unknown stream error".to_string()),
            }),
            ChatEvent::Sources { .. } | ChatEvent::Other => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_chunk_string_delta() {
        let chunk: ResponseChunk =
            serde_json::from_str(r#"{"id": "resp-1", "delta": "hello"}"#).unwrap();
        assert_eq!(chunk.delta_text(), Some("hello"));
        assert!(!chunk.is_terminal());
    }

    #[test]
    fn response_chunk_object_delta() {
        let chunk: ResponseChunk =
            serde_json::from_str(r#"{"delta": {"content": "hi", "role": "assistant"}}"#).unwrap();
        assert_eq!(chunk.delta_text(), Some("hi"));
        assert!(chunk.id.is_none());
    }

    #[test]
    fn response_chunk_completed_status() {
        let chunk: ResponseChunk =
            serde_json::from_str(r#"{"id": "resp-1", "status": "completed"}"#).unwrap();
        assert!(chunk.is_terminal());
        let events = chunk.normalize();
        assert_eq!(
            events,
            vec![StreamEvent::Done {
                continuation_id: Some("resp-1".to_string())
            }]
        );
    }

    #[test]
    fn response_chunk_delta_and_terminal_in_one() {
        let chunk: ResponseChunk =
            serde_json::from_str(r#"{"id": "resp-2", "delta": "end", "status": "completed"}"#)
                .unwrap();
        let events = chunk.normalize();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], StreamEvent::Content { .. }));
        assert!(matches!(events[1], StreamEvent::Done { .. }));
    }

    #[test]
    fn chat_event_discriminators() {
        let content: ChatEvent =
            serde_json::from_str(r#"{"type": "content", "delta": "abc"}"#).unwrap();
        assert_eq!(
            content.normalize(),
            Some(StreamEvent::Content {
                delta: "abc".to_string(),
                continuation_id: None
            })
        );

        let done: ChatEvent =
            serde_json::from_str(r#"{"type": "done", "chat_id": "chat-9"}"#).unwrap();
        assert_eq!(
            done.normalize(),
            Some(StreamEvent::Done {
                continuation_id: Some("chat-9".to_string())
            })
        );

        let error: ChatEvent =
            serde_json::from_str(r#"{"type": "error", "error": "boom"}"#).unwrap();
        assert_eq!(
            error.normalize(),
            Some(StreamEvent::Error {
                message: "boom".to_string()
            })
        );
    }

    #[test]
    fn chat_event_unknown_type_tolerated() {
        let event: ChatEvent =
            serde_json::from_str(r#"{"type": "heartbeat", "at": 12345}"#).unwrap();
        assert!(matches!(event, ChatEvent::Other));
        assert!(event.normalize().is_none());

        let sources: ChatEvent =
            serde_json::from_str(r#"{"type": "sources", "sources": ["a.md"]}"#).unwrap();
        assert!(sources.normalize().is_none());
    }
}
