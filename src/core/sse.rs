//! Incremental decoder for the backend's `text/event-stream` responses.
//!
//! The body arrives in arbitrary byte chunks. Complete lines are decoded as
//! soon as their terminating `\n` is seen; the trailing partial line stays
//! buffered until the next push.

use crate::domain::model::StreamEvent;
use serde::Deserialize;

const DATA_FIELD: &str = "data:";

#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(default)]
    chunk: Option<String>,
    #[serde(default)]
    done: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    pending_bytes: Vec<u8>,
    line_buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        self.pending_bytes.extend_from_slice(bytes);
        self.drain_utf8();

        let mut events = Vec::new();
        while let Some(pos) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=pos).collect();
            if let Some(event) = decode_line(&line[..line.len() - 1]) {
                events.push(event);
            }
        }
        events
    }

    /// Decode whatever is left once the body has ended.
    pub fn finish(mut self) -> Vec<StreamEvent> {
        if !self.pending_bytes.is_empty() {
            let rest = String::from_utf8_lossy(&self.pending_bytes).into_owned();
            self.line_buffer.push_str(&rest);
            self.pending_bytes.clear();
        }
        let mut events = Vec::new();
        for line in self.line_buffer.split('\n') {
            if let Some(event) = decode_line(line) {
                events.push(event);
            }
        }
        events
    }

    fn drain_utf8(&mut self) {
        let mut consumed = 0;
        loop {
            let rest = &self.pending_bytes[consumed..];
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.line_buffer.push_str(text);
                    consumed = self.pending_bytes.len();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&rest[..valid]) {
                        self.line_buffer.push_str(text);
                    }
                    match e.error_len() {
                        // Incomplete sequence at the end; wait for more bytes.
                        None => {
                            consumed += valid;
                            break;
                        }
                        // Invalid bytes in the middle; replace them and keep going.
                        Some(len) => {
                            self.line_buffer.push(char::REPLACEMENT_CHARACTER);
                            consumed += valid + len;
                        }
                    }
                }
            }
        }
        self.pending_bytes.drain(..consumed);
    }
}

/// Decode one SSE line. Non-`data:` lines and unparseable payloads yield `None`.
pub fn decode_line(line: &str) -> Option<StreamEvent> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let payload = line.strip_prefix(DATA_FIELD)?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);

    let frame: Frame = match serde_json::from_str(payload) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!("Skipping unparseable SSE payload ({}): {}", e, payload);
            return None;
        }
    };

    if let Some(chunk) = frame.chunk.filter(|c| !c.is_empty()) {
        Some(StreamEvent::Chunk(chunk))
    } else if frame.done.unwrap_or(false) {
        Some(StreamEvent::Done)
    } else {
        frame.error.map(StreamEvent::Error)
    }
}
