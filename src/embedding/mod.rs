// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Embedding cache and similarity index
//!
//! Vectors are computed by an external `EmbeddingProvider`; this module
//! caches them, batches provider calls, and ranks corpus chunks against a
//! query by cosine similarity.

pub mod cache;
pub mod errors;
pub mod index;
pub mod provider;
pub mod service;
pub mod vector;

pub use cache::{CacheStats, EmbeddingCache, DEFAULT_CACHE_CAPACITY};
pub use errors::EmbeddingError;
pub use index::{search, Corpus, CorpusChunk, RetrievedChunk};
pub use provider::EmbeddingProvider;
pub use service::{EmbeddingService, EmbeddingServiceConfig, DEFAULT_BATCH_SIZE};
pub use vector::{cosine_similarity, EmbeddingVector};
