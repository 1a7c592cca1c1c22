// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the RAG pipeline
//!
//! Every query ends either in a completed result or in one of these.

use thiserror::Error;

use super::state::PipelineState;
use crate::config::Locale;
use crate::embedding::EmbeddingError;
use crate::stream::StreamError;
use crate::transport::RequestError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Query rejected before processing started
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Query embedding failed
    #[error("Embedding failed: {0}")]
    Embedding(EmbeddingError),

    /// Corpus search failed (incompatible embedding model)
    #[error("Retrieval failed: {0}")]
    Retrieval(EmbeddingError),

    #[error("Generation failed: {0}")]
    Generation(RequestError),

    /// Server reported an error inside the token stream
    #[error("Generation stream failed: {0}")]
    StreamTerminal(String),

    #[error("Query cancelled")]
    Cancelled,

    #[error("Invalid pipeline transition from {from} to {to}")]
    InvalidTransition {
        from: PipelineState,
        to: PipelineState,
    },
}

impl From<RequestError> for PipelineError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::Generation(other),
        }
    }
}

impl From<StreamError> for PipelineError {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::Terminal(message) => PipelineError::StreamTerminal(message),
            StreamError::Transport(inner) => inner.into(),
            StreamError::Cancelled => PipelineError::Cancelled,
            StreamError::Incomplete => {
                PipelineError::StreamTerminal(StreamError::Incomplete.to_string())
            }
        }
    }
}

impl PipelineError {
    /// Map an embedding failure, keeping cancellation distinct
    pub fn from_embedding(e: EmbeddingError) -> Self {
        match e {
            EmbeddingError::Provider(RequestError::Cancelled) => PipelineError::Cancelled,
            other => PipelineError::Embedding(other),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            PipelineError::InvalidQuery(_) => "INVALID_QUERY",
            PipelineError::Embedding(_) => "EMBEDDING_FAILED",
            PipelineError::Retrieval(_) => "RETRIEVAL_FAILED",
            PipelineError::Generation(_) => "GENERATION_FAILED",
            PipelineError::StreamTerminal(_) => "STREAM_TERMINAL_ERROR",
            PipelineError::Cancelled => "QUERY_CANCELLED",
            PipelineError::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }

    /// Localized message that replaces the pending-answer placeholder
    pub fn user_message(&self, locale: Locale) -> String {
        match (self, locale) {
            (PipelineError::Embedding(inner), _) | (PipelineError::Retrieval(inner), _) => {
                inner.user_message(locale)
            }
            (PipelineError::Generation(inner), _) => inner.user_message(locale),
            (PipelineError::StreamTerminal(message), Locale::Vietnamese) => {
                format!("Lỗi khi tạo câu trả lời: {}", message)
            }
            (PipelineError::StreamTerminal(message), Locale::English) => {
                format!("Error while generating the answer: {}", message)
            }
            (PipelineError::InvalidQuery(_), Locale::Vietnamese) => {
                "Vui lòng nhập câu hỏi.".to_string()
            }
            (PipelineError::InvalidQuery(_), Locale::English) => {
                "Please enter a question.".to_string()
            }
            (PipelineError::Cancelled, Locale::Vietnamese) => "Đã hủy yêu cầu.".to_string(),
            (PipelineError::Cancelled, Locale::English) => "Request cancelled.".to_string(),
            (PipelineError::InvalidTransition { .. }, Locale::Vietnamese) => {
                "Đã xảy ra lỗi nội bộ. Vui lòng thử lại.".to_string()
            }
            (PipelineError::InvalidTransition { .. }, Locale::English) => {
                "An internal error occurred. Please try again.".to_string()
            }
        }
    }
}
