// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for embedding and similarity search

use thiserror::Error;

use crate::config::Locale;
use crate::transport::RequestError;

/// Errors that can occur while embedding text or ranking chunks
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    /// Two vectors that must be compared have different lengths
    #[error("Dimension mismatch: expected {expected}D, got {actual}D vectors")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Provider returned a different number of vectors than texts sent
    #[error("Embedding count mismatch: sent {expected} texts, received {actual} vectors")]
    CountMismatch { expected: usize, actual: usize },

    /// Vector contains NaN or infinite values
    #[error("Invalid vector values: {0}")]
    InvalidVector(String),

    /// Nothing to embed
    #[error("Cannot embed empty text")]
    EmptyInput,

    /// Embedding provider call failed
    #[error("Embedding provider failed: {0}")]
    Provider(#[from] RequestError),
}

impl EmbeddingError {
    /// Get error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            EmbeddingError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            EmbeddingError::CountMismatch { .. } => "EMBEDDING_COUNT_MISMATCH",
            EmbeddingError::InvalidVector(_) => "INVALID_VECTOR",
            EmbeddingError::EmptyInput => "EMPTY_INPUT",
            EmbeddingError::Provider(_) => "EMBEDDING_PROVIDER_FAILED",
        }
    }

    /// Get human-readable message for display
    pub fn user_message(&self, locale: Locale) -> String {
        match (self, locale) {
            (EmbeddingError::Provider(inner), _) => inner.user_message(locale),
            (EmbeddingError::DimensionMismatch { expected, actual }, Locale::Vietnamese) => {
                format!(
                    "Cơ sở tri thức không tương thích: cần vector {}D, nhận {}D",
                    expected, actual
                )
            }
            (EmbeddingError::DimensionMismatch { expected, actual }, Locale::English) => {
                format!(
                    "Knowledge base is incompatible: expected {}D vectors, found {}D",
                    expected, actual
                )
            }
            (_, Locale::Vietnamese) => "Không thể tạo embedding cho câu hỏi.".to_string(),
            (_, Locale::English) => "Failed to embed the query.".to_string(),
        }
    }
}
