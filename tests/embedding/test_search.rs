// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Similarity search over a corpus

use std::sync::Arc;

use rag_chat_client::embedding::{
    cosine_similarity, search, Corpus, EmbeddingError, EmbeddingVector,
};

use crate::common::{chunk, corpus, vector_with_similarity};

fn query() -> EmbeddingVector {
    EmbeddingVector::new(vec![1.0, 0.0], "query")
}

#[test]
fn test_identical_vectors_score_one() {
    let v = vec![0.3, -0.2, 0.9, 0.1];
    let sim = cosine_similarity(&v, &v).unwrap();
    assert!((sim - 1.0).abs() < 1e-6);
}

#[test]
fn test_similarity_is_symmetric() {
    let a = vec![0.3, -0.2, 0.9];
    let b = vec![-0.5, 0.4, 0.2];
    let ab = cosine_similarity(&a, &b).unwrap();
    let ba = cosine_similarity(&b, &a).unwrap();
    assert!((ab - ba).abs() < 1e-6);
}

#[test]
fn test_zero_vector_scores_zero() {
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
}

#[test]
fn test_dimension_mismatch_rejected() {
    let err = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).unwrap_err();
    assert_eq!(
        err,
        EmbeddingError::DimensionMismatch {
            expected: 2,
            actual: 3
        }
    );
}

#[test]
fn test_threshold_and_top_k_respected() {
    let chunks = (0..10)
        .map(|i| {
            let sim = 0.5 + i as f32 * 0.05;
            chunk(&format!("doc{}", i), "text", vector_with_similarity(sim))
        })
        .collect();
    let corpus = corpus(chunks);

    let results = corpus.search(&query(), 3, 0.7).unwrap();

    assert_eq!(results.len(), 3);
    for (i, r) in results.iter().enumerate() {
        assert_eq!(r.rank, i);
        assert!(r.similarity >= 0.7);
    }
    assert_eq!(results[0].source_id, "doc9");
    assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
}

#[test]
fn test_fewer_matches_than_top_k() {
    let corpus = corpus(vec![
        chunk("a", "An toàn thông tin", vector_with_similarity(0.95)),
        chunk("b", "Thời tiết", vector_with_similarity(0.60)),
    ]);

    let results = corpus.search(&query(), 5, 0.7).unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].source_id, "a");
    assert!((results[0].raw_score - 0.95).abs() < 1e-4);
}

#[test]
fn test_empty_corpus_returns_nothing() {
    let results = search(&query(), &[], 5, 0.0).unwrap();
    assert!(results.is_empty());
}

#[test]
fn test_ties_keep_corpus_order() {
    let corpus = corpus(vec![
        chunk("first", "x", vec![1.0, 0.0]),
        chunk("second", "y", vec![2.0, 0.0]),
        chunk("third", "z", vec![3.0, 0.0]),
    ]);

    let results = corpus.search(&query(), 3, 0.5).unwrap();
    let ids: Vec<_> = results.iter().map(|r| r.source_id.as_str()).collect();
    assert_eq!(ids, vec!["first", "second", "third"]);
}

#[test]
fn test_negative_similarity_clamped() {
    let corpus = corpus(vec![chunk("opposite", "x", vec![-1.0, 0.0])]);
    let results = corpus.search(&query(), 5, 0.0).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].similarity, 0.0);
}

#[test]
fn test_corpus_rejects_mixed_dimensions() {
    let mut corpus = Corpus::new();
    corpus.add(chunk("a", "x", vec![1.0, 0.0])).unwrap();
    let err = corpus.add(chunk("b", "y", vec![1.0, 0.0, 0.0])).unwrap_err();

    assert!(matches!(err, EmbeddingError::DimensionMismatch { .. }));
    assert_eq!(corpus.len(), 1);
    assert_eq!(corpus.dimension(), Some(2));
}

#[test]
fn test_query_dimension_mismatch_fails_search() {
    let corpus = corpus(vec![chunk("a", "x", vec![1.0, 0.0, 0.0])]);
    let shared = Arc::new(corpus);
    assert!(shared.search(&query(), 5, 0.0).is_err());
}
