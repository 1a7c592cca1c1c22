// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Embedding service orchestration
//!
//! Coordinates the embedding provider and the shared cache:
//! - Cache lookup by normalized text before any provider call
//! - Fixed-size batching for bulk embedding
//! - Bounded concurrency across sub-batches with input order preserved
//! - Dimension and value validation of everything the provider returns

use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use super::cache::EmbeddingCache;
use super::errors::EmbeddingError;
use super::provider::EmbeddingProvider;
use super::vector::EmbeddingVector;

/// Default number of texts per provider call
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Settings for the embedding service
#[derive(Debug, Clone)]
pub struct EmbeddingServiceConfig {
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
    /// Expected dimension; learned from the first vector when `None`
    pub dimension: Option<usize>,
}

impl Default for EmbeddingServiceConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrent_batches: 4,
            dimension: None,
        }
    }
}

/// Cached, batched access to an embedding provider
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<EmbeddingCache>,
    batch_size: usize,
    max_concurrent_batches: usize,
    dimension: OnceLock<usize>,
}

impl EmbeddingService {
    /// Create a new embedding service
    ///
    /// # Arguments
    /// * `provider` - External embedding backend
    /// * `cache` - Process-wide cache shared with other services
    /// * `config` - Batching and validation settings
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        cache: Arc<EmbeddingCache>,
        config: EmbeddingServiceConfig,
    ) -> Self {
        let dimension = OnceLock::new();
        if let Some(d) = config.dimension {
            let _ = dimension.set(d);
        }

        Self {
            provider,
            cache,
            batch_size: config.batch_size.max(1),
            max_concurrent_batches: config.max_concurrent_batches.max(1),
            dimension,
        }
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    /// Dimension every vector must have, once known
    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    /// Embed a single text, using the cache when possible
    pub async fn embed(&self, text: &str) -> Result<Arc<EmbeddingVector>, EmbeddingError> {
        let key = EmbeddingCache::cache_key(text);
        if key.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        if let Some(vector) = self.cache.get(&key) {
            return Ok(vector);
        }

        let mut vectors = self.embed_uncached(vec![key.clone()]).await?;
        let vector = vectors.pop().ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            actual: 0,
        })?;

        self.cache.insert(&key, vector.clone());
        Ok(vector)
    }

    /// Embed many texts in fixed-size batches
    ///
    /// Output order matches input order regardless of batching or the order
    /// in which concurrent sub-batches finish. Duplicate texts are embedded
    /// once.
    pub async fn embed_batch(
        &self,
        texts: &[String],
    ) -> Result<Vec<Arc<EmbeddingVector>>, EmbeddingError> {
        let keys: Vec<String> = texts.iter().map(|t| EmbeddingCache::cache_key(t)).collect();
        if keys.iter().any(|k| k.is_empty()) {
            return Err(EmbeddingError::EmptyInput);
        }

        let mut resolved: HashMap<String, Arc<EmbeddingVector>> = HashMap::new();
        let mut misses: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::with_capacity(keys.len());
        for key in &keys {
            if !seen.insert(key.as_str()) {
                continue;
            }
            match self.cache.get(key) {
                Some(vector) => {
                    resolved.insert(key.clone(), vector);
                }
                None => misses.push(key.clone()),
            }
        }

        if !misses.is_empty() {
            info!(
                "Embedding {} texts ({} cached) in batches of {}",
                misses.len(),
                resolved.len(),
                self.batch_size
            );

            let batches: Vec<Vec<String>> =
                misses.chunks(self.batch_size).map(|c| c.to_vec()).collect();
            let embedded: Vec<Vec<Arc<EmbeddingVector>>> = stream::iter(batches)
                .map(|batch| self.embed_uncached(batch))
                .buffered(self.max_concurrent_batches)
                .try_collect()
                .await?;

            for (key, vector) in misses.iter().zip(embedded.into_iter().flatten()) {
                self.cache.insert(key, vector.clone());
                resolved.insert(key.clone(), vector);
            }
        }

        keys.iter()
            .map(|key| {
                resolved.get(key).cloned().ok_or(EmbeddingError::CountMismatch {
                    expected: keys.len(),
                    actual: resolved.len(),
                })
            })
            .collect()
    }

    /// Call the provider for one batch and validate the result
    async fn embed_uncached(
        &self,
        batch: Vec<String>,
    ) -> Result<Vec<Arc<EmbeddingVector>>, EmbeddingError> {
        debug!(
            "Requesting {} embeddings from {}",
            batch.len(),
            self.provider.name()
        );
        let raw = self.provider.embed_texts(&batch).await?;

        if raw.len() != batch.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: batch.len(),
                actual: raw.len(),
            });
        }

        batch
            .into_iter()
            .zip(raw)
            .map(|(text, values)| {
                let vector = EmbeddingVector::new(values, text);
                vector.validate()?;
                self.check_dimension(vector.dimension())?;
                Ok(Arc::new(vector))
            })
            .collect()
    }

    fn check_dimension(&self, actual: usize) -> Result<(), EmbeddingError> {
        let expected = *self.dimension.get_or_init(|| actual);
        if expected != actual {
            return Err(EmbeddingError::DimensionMismatch { expected, actual });
        }
        Ok(())
    }
}
