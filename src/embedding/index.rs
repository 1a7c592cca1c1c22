// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Brute-force similarity index over an in-memory corpus
//!
//! Every query is compared against every chunk. Results below the
//! similarity floor are discarded before the top-K cut, and ties keep
//! corpus order so rankings are deterministic.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::errors::EmbeddingError;
use super::vector::{cosine_similarity, EmbeddingVector};

/// Unit of retrievable text with its embedding
#[derive(Debug, Clone)]
pub struct CorpusChunk {
    pub source_id: String,
    pub text: String,
    pub vector: Arc<EmbeddingVector>,
}

/// Chunk returned by a search, ordered by `rank`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub source_id: String,
    /// Clipped cosine score against the query
    pub raw_score: f32,
    /// Relevance after any reranking, in [0, 1]
    pub similarity: f32,
    pub rank: usize,
}

/// Collection of chunks sharing one embedding dimension
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    chunks: Vec<CorpusChunk>,
    dimension: Option<usize>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk, rejecting vectors from an incompatible model
    pub fn add(&mut self, chunk: CorpusChunk) -> Result<(), EmbeddingError> {
        let actual = chunk.vector.dimension();
        match self.dimension {
            Some(expected) if expected != actual => {
                return Err(EmbeddingError::DimensionMismatch { expected, actual });
            }
            None => self.dimension = Some(actual),
            _ => {}
        }

        self.chunks.push(chunk);
        Ok(())
    }

    pub fn chunks(&self) -> &[CorpusChunk] {
        &self.chunks
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn search(
        &self,
        query: &EmbeddingVector,
        top_k: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<RetrievedChunk>, EmbeddingError> {
        search(query, &self.chunks, top_k, similarity_threshold)
    }
}

/// Rank `chunks` against `query`
///
/// # Arguments
/// * `query` - Query embedding
/// * `chunks` - Candidate chunks
/// * `top_k` - Maximum number of results
/// * `similarity_threshold` - Results scoring below this are dropped
///
/// # Returns
/// At most `top_k` chunks with similarity >= threshold, ranked 0..K-1.
/// A dimension mismatch against any chunk fails the whole search.
pub fn search(
    query: &EmbeddingVector,
    chunks: &[CorpusChunk],
    top_k: usize,
    similarity_threshold: f32,
) -> Result<Vec<RetrievedChunk>, EmbeddingError> {
    let mut scored = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let score = cosine_similarity(&query.values, &chunk.vector.values)?;
        scored.push((chunk, score.clamp(0.0, 1.0)));
    }

    let candidates = scored.len();
    scored.retain(|(_, score)| *score >= similarity_threshold);
    // sort_by is stable, so equal scores keep corpus order
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);

    debug!(
        "Search kept {} of {} chunks (threshold {}, top_k {})",
        scored.len(),
        candidates,
        similarity_threshold,
        top_k
    );

    Ok(scored
        .into_iter()
        .enumerate()
        .map(|(rank, (chunk, score))| RetrievedChunk {
            text: chunk.text.clone(),
            source_id: chunk.source_id.clone(),
            raw_score: score,
            similarity: score,
            rank,
        })
        .collect())
}
