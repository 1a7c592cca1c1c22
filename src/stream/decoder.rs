// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Incremental decoder for the generation event stream
//!
//! The transport delivers arbitrary byte chunks. A record may be split
//! anywhere, including inside a multibyte UTF-8 sequence, so the decoder
//! keeps both the undecoded tail bytes and the incomplete trailing line
//! between calls to `feed`.

use tracing::warn;

use super::events::{StreamEvent, StreamParseError};

const DATA_PREFIX: &str = "data:";
const DONE_MARKER: &str = "[DONE]";

/// Longest line buffered while waiting for its newline
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Stateful line reassembler and event parser
#[derive(Debug)]
pub struct StreamDecoder {
    line_buffer: String,
    pending_bytes: Vec<u8>,
    skipped_lines: usize,
    max_line_bytes: usize,
    /// Dropping the rest of an over-long line until its newline arrives
    discarding: bool,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::with_max_line_bytes(DEFAULT_MAX_LINE_BYTES)
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that rejects lines longer than `max_line_bytes`
    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            line_buffer: String::new(),
            pending_bytes: Vec::new(),
            skipped_lines: 0,
            max_line_bytes: max_line_bytes.max(1),
            discarding: false,
        }
    }

    /// Number of malformed lines skipped so far
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Decode one chunk, returning the events of every line it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.pending_bytes.extend_from_slice(chunk);
        let text = self.take_decoded_text();
        self.line_buffer.push_str(&text);

        let mut events = Vec::new();
        while let Some(pos) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=pos).collect();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.len() > self.max_line_bytes {
                self.reject_long_line();
                continue;
            }
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        if self.line_buffer.len() > self.max_line_bytes {
            if !self.discarding {
                self.reject_long_line();
                self.discarding = true;
            }
            self.line_buffer.clear();
        }
        events
    }

    fn reject_long_line(&mut self) {
        let e = StreamParseError::LineTooLong {
            limit: self.max_line_bytes,
        };
        self.skipped_lines += 1;
        warn!(code = e.error_code(), "Skipping stream line: {}", e);
    }

    /// Flush state at transport EOF
    ///
    /// Any trailing bytes are decoded lossily and the final unterminated
    /// line is processed as if it ended with a newline.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if !self.pending_bytes.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending_bytes).into_owned();
            self.pending_bytes.clear();
            self.line_buffer.push_str(&tail);
        }

        let line = std::mem::take(&mut self.line_buffer);
        if std::mem::take(&mut self.discarding) {
            return Vec::new();
        }
        if line.len() > self.max_line_bytes {
            self.reject_long_line();
            return Vec::new();
        }
        self.process_line(&line).into_iter().collect()
    }

    /// Decode as much of the pending bytes as forms complete UTF-8
    fn take_decoded_text(&mut self) -> String {
        let mut text = String::new();
        loop {
            match std::str::from_utf8(&self.pending_bytes) {
                Ok(valid) => {
                    text.push_str(valid);
                    self.pending_bytes.clear();
                    return text;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.pending_bytes[..valid_up_to]));
                    match e.error_len() {
                        // Incomplete sequence at the end; wait for more bytes
                        None => {
                            self.pending_bytes.drain(..valid_up_to);
                            return text;
                        }
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            self.pending_bytes.drain(..valid_up_to + len);
                        }
                    }
                }
            }
        }
    }

    fn process_line(&mut self, line: &str) -> Option<StreamEvent> {
        let line = line.trim_end_matches(['\n', '\r']);
        let payload = line.strip_prefix(DATA_PREFIX)?;
        let payload = payload.strip_prefix(' ').unwrap_or(payload);

        if payload.trim().is_empty() || payload.trim() == DONE_MARKER {
            return None;
        }

        match parse_event(payload) {
            Ok(event) => Some(event),
            Err(e) => {
                self.skipped_lines += 1;
                warn!(
                    code = e.error_code(),
                    "Skipping stream line: {} ({})",
                    e,
                    payload
                );
                None
            }
        }
    }
}

/// Parse one `data:` payload into an event
pub fn parse_event(payload: &str) -> Result<StreamEvent, StreamParseError> {
    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => Ok(event),
        Err(e) => {
            let value: serde_json::Value = serde_json::from_str(payload)
                .map_err(|_| StreamParseError::MalformedJson(e.to_string()))?;
            match value.get("type").and_then(|t| t.as_str()) {
                Some(kind) if !matches!(kind, "start" | "token" | "end" | "error") => {
                    Err(StreamParseError::UnknownType(kind.to_string()))
                }
                _ => Err(StreamParseError::MalformedJson(e.to_string())),
            }
        }
    }
}
