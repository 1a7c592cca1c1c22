// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Reranking, grounding-context assembly and confidence scoring

use crate::embedding::RetrievedChunk;

use super::query::Query;

const KEYWORD_BOOST: f32 = 0.1;
const ENTITY_BOOST: f32 = 0.05;
const CONFIDENCE_TOP_N: usize = 3;
const CHUNK_SEPARATOR: &str = "\n\n";
const ELLIPSIS: &str = "...";

/// Limits on the context inserted into the generation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLimits {
    pub max_context_chars: usize,
    pub max_chunk_chars: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_context_chars: 3000,
            max_chunk_chars: 800,
        }
    }
}

/// Boost chunks that mention query keywords or entities, then re-rank
///
/// Each keyword found adds 0.1 and each entity 0.05 to the raw score,
/// capped at 1.0. Equal scores keep their previous order.
pub fn rerank(mut chunks: Vec<RetrievedChunk>, query: &Query) -> Vec<RetrievedChunk> {
    for chunk in &mut chunks {
        let text = chunk.text.to_lowercase();
        let keyword_matches = query
            .keywords
            .iter()
            .filter(|k| text.contains(k.as_str()))
            .count();
        let entity_matches = query
            .entities
            .iter()
            .filter(|e| chunk.text.contains(e.as_str()))
            .count();

        chunk.similarity = (chunk.raw_score
            + KEYWORD_BOOST * keyword_matches as f32
            + ENTITY_BOOST * entity_matches as f32)
            .min(1.0);
    }

    chunks.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    for (rank, chunk) in chunks.iter_mut().enumerate() {
        chunk.rank = rank;
    }
    chunks
}

/// Truncate to `max_chars` characters, marking the cut with `...`
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

/// Join chunk texts in rank order within the context budget
pub fn build_context(chunks: &[RetrievedChunk], limits: ContextLimits) -> String {
    let mut ordered: Vec<&RetrievedChunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.rank);

    let separator_len = CHUNK_SEPARATOR.chars().count();
    let mut context = String::new();
    let mut used = 0;

    for chunk in ordered {
        let separator = if context.is_empty() { 0 } else { separator_len };
        let remaining = limits
            .max_context_chars
            .saturating_sub(used + separator);
        if remaining == 0 {
            break;
        }

        let piece = truncate_chars(chunk.text.trim(), limits.max_chunk_chars);
        let piece_len = piece.chars().count();
        if separator > 0 {
            context.push_str(CHUNK_SEPARATOR);
        }

        if piece_len > remaining {
            let cut: String = piece.chars().take(remaining).collect();
            context.push_str(&cut);
            break;
        }

        context.push_str(&piece);
        used += separator + piece_len;
    }

    context
}

/// Mean similarity of the top three sources, 0.0 when there are none
pub fn confidence(sources: &[RetrievedChunk]) -> f32 {
    let top: Vec<f32> = sources
        .iter()
        .take(CONFIDENCE_TOP_N)
        .map(|s| s.similarity)
        .collect();
    if top.is_empty() {
        return 0.0;
    }
    top.iter().sum::<f32>() / top.len() as f32
}
