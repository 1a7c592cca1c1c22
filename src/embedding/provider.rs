// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Embedding provider trait definition

use async_trait::async_trait;

use super::errors::EmbeddingError;

/// Trait for the external model-serving boundary that turns text into vectors
///
/// The client never computes embeddings itself; implementations call out to
/// whatever serves the embedding model.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts
    ///
    /// # Returns
    /// One vector per input text, in input order
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get the provider name for logging
    fn name(&self) -> &'static str;
}
