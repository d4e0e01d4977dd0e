//! Incremental decoder for `text/event-stream` completion bodies.
//!
//! Bytes are buffered until a full line is available, so payloads split
//! across network chunks (including in the middle of a multi-byte UTF-8
//! sequence) are reassembled before they are decoded.

use memchr::memchr;
use tracing::warn;

use crate::api::error::{extract_error_summary, ApiError};
use crate::api::ChatStreamChunk;

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// A new fragment of assistant text.
    Delta(String),
    /// The server sent `data: [DONE]`.
    Done,
    /// The server embedded an error object in the stream.
    Error(ApiError),
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once `[DONE]` or an error event has been produced; later input
    /// is ignored.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Append a body chunk and decode every complete line it closes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        self.buffer.extend_from_slice(chunk);

        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if self.process_line(&line[..newline_pos], &mut events) {
                self.buffer.clear();
                break;
            }
        }
        events
    }

    /// Decode whatever is left once the transport has closed; servers are
    /// not required to newline-terminate their final event.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if self.finished || self.buffer.is_empty() {
            return events;
        }
        let line = std::mem::take(&mut self.buffer);
        self.process_line(&line, &mut events);
        events
    }

    fn process_line(&mut self, raw: &[u8], events: &mut Vec<SseEvent>) -> bool {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim(),
            Err(err) => {
                warn!("Invalid UTF-8 in stream: {err}");
                return false;
            }
        };

        let Some(payload) = extract_data_payload(line) else {
            return false;
        };

        match handle_data_payload(payload) {
            Some(event @ (SseEvent::Done | SseEvent::Error(_))) => {
                events.push(event);
                self.finished = true;
                true
            }
            Some(event) => {
                events.push(event);
                false
            }
            None => false,
        }
    }
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn handle_data_payload(payload: &str) -> Option<SseEvent> {
    if payload == DONE_SENTINEL {
        return Some(SseEvent::Done);
    }
    if payload.is_empty() {
        return None;
    }

    match serde_json::from_str::<ChatStreamChunk>(payload) {
        Ok(chunk) => {
            if let Some(error) = chunk.error {
                let code = error.get("code").and_then(|code| code.as_i64());
                let message = extract_error_summary(&serde_json::json!({ "error": error }))
                    .unwrap_or_else(|| "Stream reported an error".to_string());
                return Some(SseEvent::Error(ApiError::Application { code, message }));
            }
            chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .filter(|content| !content.is_empty())
                .map(SseEvent::Delta)
        }
        Err(err) => {
            warn!(payload, "Skipping malformed stream payload: {err}");
            None
        }
    }
}
