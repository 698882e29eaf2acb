//! Server-sent event framing for streaming responses.
//!
//! Both backend variants deliver their chunks as SSE `data:` frames over a
//! chunked HTTP response. This module turns the raw byte stream into a stream
//! of `data:` payload strings, handling buffering, frames split across reads,
//! the `[DONE]` transport end marker, and a trailing partial frame at end of
//! stream. Bytes are buffered raw and decoded only per complete frame, so a
//! multi-byte character split across transport reads never misdecodes.
//! Decoding payloads into a concrete wire shape happens in the clients.

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};

use crate::error::{Error, Result};

/// Process a stream of bytes into a stream of SSE `data:` payloads.
///
/// The stream ends when the transport ends or when a `data: [DONE]` frame is
/// seen, whichever comes first. HTTP-level errors surface as
/// `Error::Streaming` items; invalid UTF-8 within a frame surfaces as
/// `Error::Encoding`.
pub fn data_frames<S>(byte_stream: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + 'static,
{
    // Convert reqwest errors to our error type
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    // Use a state machine to process the SSE stream
    let buffer = BytesMut::new();

    stream::unfold(
        (stream, buffer, false),
        move |(mut stream, mut buffer, finished)| async move {
            if finished {
                return None;
            }
            loop {
                // First check if we have a complete frame in the buffer
                if let Some(frame_bytes) = split_frame(&mut buffer) {
                    match decode_frame(&frame_bytes) {
                        Ok(Frame::Data(payload)) => {
                            return Some((Ok(payload), (stream, buffer, false)));
                        }
                        Ok(Frame::Done) => return None,
                        Ok(Frame::Empty) => continue,
                        Err(err) => return Some((Err(err), (stream, buffer, false))),
                    }
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => buffer.extend_from_slice(&bytes),
                    Some(Err(e)) => {
                        return Some((Err(e), (stream, buffer, false)));
                    }
                    None => {
                        // End of stream: flush a trailing frame that never got
                        // its closing blank line.
                        let leftover = buffer.split();
                        if leftover.is_empty() {
                            return None;
                        }
                        match decode_frame(&leftover) {
                            Ok(Frame::Data(payload)) => {
                                return Some((Ok(payload), (stream, buffer, true)));
                            }
                            Ok(Frame::Done) | Ok(Frame::Empty) => return None,
                            Err(err) => return Some((Err(err), (stream, buffer, true))),
                        }
                    }
                }
            }
        },
    )
}

enum Frame {
    Data(String),
    Done,
    Empty,
}

/// Splits one complete frame (everything before a double newline) off the
/// front of the buffer, or returns `None` if no delimiter has arrived yet.
fn split_frame(buffer: &mut BytesMut) -> Option<BytesMut> {
    let pos = buffer.windows(2).position(|window| window == b"\n\n")?;
    let frame = buffer.split_to(pos);
    let _ = buffer.split_to(2);
    Some(frame)
}

/// Decode a complete SSE frame.
///
/// Within a frame only the last `data:` line matters. Frames without a data
/// line (comments, bare `event:` lines, keep-alives) are empty.
fn decode_frame(frame: &[u8]) -> Result<Frame> {
    let text = std::str::from_utf8(frame).map_err(|e| {
        Error::encoding(format!("Invalid UTF-8 in stream: {e}"), Some(Box::new(e)))
    })?;
    Ok(match last_data_line(text) {
        Some("[DONE]") => Frame::Done,
        Some(payload) => Frame::Data(payload.to_string()),
        None => Frame::Empty,
    })
}

fn last_data_line(frame_text: &str) -> Option<&str> {
    let mut data = None;
    for line in frame_text.lines() {
        if let Some(payload) = line.strip_prefix("data:") {
            data = Some(payload.trim());
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn single_frame() {
        let data = b"data: {\"delta\": \"hi\"}\n\n";
        let stream = Box::pin(stream::once(async { Ok(Bytes::from(&data[..])) }));

        let mut frames = Box::pin(data_frames(stream));
        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame, "{\"delta\": \"hi\"}");
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn multiple_frames_in_one_read() {
        let data = b"data: {\"a\": 1}\n\ndata: {\"b\": 2}\n\n";
        let stream = Box::pin(stream::once(async { Ok(Bytes::from(&data[..])) }));

        let mut frames = Box::pin(data_frames(stream));
        assert_eq!(frames.next().await.unwrap().unwrap(), "{\"a\": 1}");
        assert_eq!(frames.next().await.unwrap().unwrap(), "{\"b\": 2}");
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn frame_split_across_reads() {
        let chunk1 = b"data: {\"delta\": ";
        let chunk2 = b"\"split\"}\n\n";
        let stream = Box::pin(stream::iter(vec![
            Ok(Bytes::from(&chunk1[..])),
            Ok(Bytes::from(&chunk2[..])),
        ]));

        let mut frames = Box::pin(data_frames(stream));
        assert_eq!(frames.next().await.unwrap().unwrap(), "{\"delta\": \"split\"}");
    }

    #[tokio::test]
    async fn multibyte_character_split_across_reads() {
        let data = "data: {\"delta\": \"a\u{1f600}b\"}\n\n".as_bytes();
        // Split two bytes into the four-byte emoji.
        let split = 20;
        assert!(std::str::from_utf8(&data[..split]).is_err());
        let stream = Box::pin(stream::iter(vec![
            Ok(Bytes::copy_from_slice(&data[..split])),
            Ok(Bytes::copy_from_slice(&data[split..])),
        ]));

        let mut frames = Box::pin(data_frames(stream));
        assert_eq!(
            frames.next().await.unwrap().unwrap(),
            "{\"delta\": \"a\u{1f600}b\"}"
        );
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn done_marker_ends_stream() {
        let data = b"data: {\"a\": 1}\n\ndata: [DONE]\n\ndata: {\"after\": true}\n\n";
        let stream = Box::pin(stream::once(async { Ok(Bytes::from(&data[..])) }));

        let mut frames = Box::pin(data_frames(stream));
        assert_eq!(frames.next().await.unwrap().unwrap(), "{\"a\": 1}");
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn event_line_is_ignored_data_line_wins() {
        let data = b"event: content\ndata: {\"x\": 1}\n\n";
        let stream = Box::pin(stream::once(async { Ok(Bytes::from(&data[..])) }));

        let mut frames = Box::pin(data_frames(stream));
        assert_eq!(frames.next().await.unwrap().unwrap(), "{\"x\": 1}");
    }

    #[tokio::test]
    async fn keepalive_frame_skipped() {
        let data = b": keep-alive\n\ndata: {\"x\": 1}\n\n";
        let stream = Box::pin(stream::once(async { Ok(Bytes::from(&data[..])) }));

        let mut frames = Box::pin(data_frames(stream));
        assert_eq!(frames.next().await.unwrap().unwrap(), "{\"x\": 1}");
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn trailing_frame_without_terminator_flushed() {
        let data = b"data: {\"a\": 1}\n\ndata: {\"tail\": true}";
        let stream = Box::pin(stream::once(async { Ok(Bytes::from(&data[..])) }));

        let mut frames = Box::pin(data_frames(stream));
        assert_eq!(frames.next().await.unwrap().unwrap(), "{\"a\": 1}");
        assert_eq!(frames.next().await.unwrap().unwrap(), "{\"tail\": true}");
        assert!(frames.next().await.is_none());
    }
}
