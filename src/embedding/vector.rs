// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::EmbeddingError;

/// Embedding of a piece of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    pub values: Vec<f32>,
    pub source_text: String,
    pub created_at: DateTime<Utc>,
}

impl EmbeddingVector {
    pub fn new(values: Vec<f32>, source_text: impl Into<String>) -> Self {
        Self {
            values,
            source_text: source_text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn magnitude(&self) -> f32 {
        magnitude(&self.values)
    }

    pub fn cosine_similarity(&self, other: &EmbeddingVector) -> Result<f32, EmbeddingError> {
        cosine_similarity(&self.values, &other.values)
    }

    /// Reject NaN and infinite values
    pub fn validate(&self) -> Result<(), EmbeddingError> {
        if self.values.iter().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::InvalidVector(
                "contains NaN or Infinity (all values must be finite numbers)".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn magnitude(values: &[f32]) -> f32 {
    values.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity of two equal-length vectors
///
/// Returns 0.0 when either vector has zero magnitude. Vectors of different
/// dimensions come from incompatible models and are rejected.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, EmbeddingError> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a = magnitude(a);
    let magnitude_b = magnitude(b);

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (magnitude_a * magnitude_b))
}
