// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for backend requests
//!
//! Transport failures (timeouts, aborted or reset connections, empty
//! responses) are retried by the resilient client. Decoded server errors
//! surface immediately with the server's own message.

use thiserror::Error;

use crate::config::Locale;

/// Errors that can occur while talking to the backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    /// Attempt exceeded its deadline and was aborted
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// In-flight request was aborted by the transport
    #[error("Request aborted")]
    Aborted,

    /// Caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,

    /// Connection could not be established or was reset
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Server closed the connection without a response body
    #[error("Server returned an empty response")]
    EmptyResponse,

    /// Well-formed non-2xx response from the server
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Request rejected before it was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RequestError {
    /// Check if this error is a transient transport failure
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RequestError::Timeout { .. }
                | RequestError::Aborted
                | RequestError::Connection(_)
                | RequestError::EmptyResponse
        )
    }

    /// Get error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::Timeout { .. } => "REQUEST_TIMEOUT",
            RequestError::Aborted => "REQUEST_ABORTED",
            RequestError::Cancelled => "REQUEST_CANCELLED",
            RequestError::Connection(_) => "CONNECTION_FAILED",
            RequestError::EmptyResponse => "EMPTY_RESPONSE",
            RequestError::Server { .. } => "SERVER_ERROR",
            RequestError::Decode(_) => "DECODE_ERROR",
            RequestError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    /// Get human-readable message for display
    pub fn user_message(&self, locale: Locale) -> String {
        match (self, locale) {
            (RequestError::Timeout { .. }, Locale::Vietnamese)
            | (RequestError::Aborted, Locale::Vietnamese) => {
                "Request timeout. Vui lòng thử lại.".to_string()
            }
            (RequestError::Timeout { .. }, Locale::English)
            | (RequestError::Aborted, Locale::English) => {
                "Request timed out. Please try again.".to_string()
            }
            (RequestError::Cancelled, Locale::Vietnamese) => "Yêu cầu đã bị hủy.".to_string(),
            (RequestError::Cancelled, Locale::English) => "Request was cancelled.".to_string(),
            (RequestError::Connection(_), Locale::Vietnamese) => {
                "Lỗi mạng - không thể kết nối tới server.".to_string()
            }
            (RequestError::Connection(_), Locale::English) => {
                "Network error - cannot connect to server.".to_string()
            }
            (RequestError::EmptyResponse, Locale::Vietnamese) => {
                "Mất kết nối tới server - vui lòng kiểm tra backend.".to_string()
            }
            (RequestError::EmptyResponse, Locale::English) => {
                "Server connection lost - please check if backend is running.".to_string()
            }
            // Server messages are surfaced verbatim
            (RequestError::Server { message, .. }, _) => message.clone(),
            _ => self.to_string(),
        }
    }
}
