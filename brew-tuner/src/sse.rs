//! Server-Sent Events client decoding
//!
//! Turns the raw byte stream of `GET /optimizer/runs/{id}/events` into
//! [`RunEvent`]s. Only the parts of the SSE wire format the optimizer uses are
//! handled: `data:` lines (joined with `\n` when split), `:` comments
//! (heartbeats) and blank-line frame boundaries. `event:`, `id:` and `retry:`
//! fields are accepted and ignored.

use brew_common::{Error, Result, RunEvent};
use futures::stream::{Stream, StreamExt};
use std::fmt::Display;
use tracing::{debug, warn};

/// Incremental SSE frame decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the `data` payloads of every frame it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            let frame = self.data.join("\n");
            self.data.clear();
            return Some(frame);
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }
}

/// Decode a byte stream into run events
///
/// Transport errors surface as `Err` items (the caller falls back to polling);
/// payloads that fail to decode are skipped with a warning.
pub fn decode_run_events<S, B, E>(bytes: S) -> impl Stream<Item = Result<RunEvent>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    async_stream::stream! {
        let mut decoder = SseDecoder::new();
        let mut bytes = Box::pin(bytes);

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    for data in decoder.push(chunk.as_ref()) {
                        match RunEvent::from_json(&data) {
                            Ok(event) => {
                                debug!(trial = event.trial_number, "SSE frame decoded");
                                yield Ok(event);
                            }
                            Err(e) => warn!("Skipping malformed run event: {}", e),
                        }
                    }
                }
                Err(e) => {
                    yield Err(Error::Network(format!("event stream interrupted: {}", e)));
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brew_common::RunStatus;
    use futures::stream;

    #[test]
    fn test_frames_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"trial_num").is_empty());
        assert!(decoder.push(b"ber\": 1}\r\n").is_empty());
        let frames = decoder.push(b"\r\n");
        assert_eq!(frames, vec!["{\"trial_number\": 1}"]);
    }

    #[test]
    fn test_comments_and_other_fields_ignored() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": heartbeat\n\nevent: update\nid: 7\ndata: a\ndata: b\n\n");
        assert_eq!(frames, vec!["a\nb"]);
    }

    #[tokio::test]
    async fn test_decode_skips_malformed_payloads() {
        let chunks: Vec<std::result::Result<&'static [u8], String>> = vec![
            Ok(&b"data: not json\n\n"[..]),
            Ok(&b"data: {\"trial_number\": 3, \"run_status\": \"running\", \"last_trial_score\": 7.5}\n\n"[..]),
        ];
        let events: Vec<_> = decode_run_events(stream::iter(chunks)).collect().await;

        assert_eq!(events.len(), 1);
        let event = events[0].as_ref().unwrap();
        assert_eq!(event.trial_number, 3);
        assert_eq!(event.run_status, RunStatus::Running);
        assert_eq!(event.last_trial_score, Some(7.5));
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let chunks: Vec<std::result::Result<&'static [u8], String>> = vec![
            Err("connection reset".to_string()),
            Ok(&b"data: {\"trial_number\": 1, \"run_status\": \"running\"}\n\n"[..]),
        ];
        let events: Vec<_> = decode_run_events(stream::iter(chunks)).collect().await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(Error::Network(_))));
    }
}
