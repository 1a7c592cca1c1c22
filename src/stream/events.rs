// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Event decoded from a `data: {...}` line of the generation stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Start {
        #[serde(default)]
        message: String,
    },
    Token {
        content: String,
    },
    End {
        #[serde(default, alias = "response_length")]
        total_length: usize,
    },
    Error {
        #[serde(default)]
        message: String,
    },
}

impl StreamEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Start { .. } => "start",
            StreamEvent::Token { .. } => "token",
            StreamEvent::End { .. } => "end",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// Format the event as a stream line, as the server sends it
    pub fn to_sse_line(&self) -> String {
        format!(
            "data: {}\n",
            serde_json::to_string(self).unwrap_or_default()
        )
    }
}

/// A single stream line that could not be decoded
///
/// Always recovered: the line is logged and skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamParseError {
    #[error("Malformed event payload: {0}")]
    MalformedJson(String),

    #[error("Unknown event type '{0}'")]
    UnknownType(String),

    #[error("Line exceeds {limit} bytes without a newline")]
    LineTooLong { limit: usize },
}

impl StreamParseError {
    pub fn error_code(&self) -> &'static str {
        match self {
            StreamParseError::MalformedJson(_) => "STREAM_MALFORMED_JSON",
            StreamParseError::UnknownType(_) => "STREAM_UNKNOWN_TYPE",
            StreamParseError::LineTooLong { .. } => "STREAM_LINE_TOO_LONG",
        }
    }
}
