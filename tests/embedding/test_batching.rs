// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Batched, cached embedding through EmbeddingService

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rag_chat_client::embedding::{
    EmbeddingCache, EmbeddingError, EmbeddingProvider, EmbeddingService, EmbeddingServiceConfig,
};
use rag_chat_client::transport::RequestError;

use crate::common::{embedding_service, init_tracing, FixedProvider};

/// Encodes each text's length; later batches answer faster than earlier ones
struct LengthProvider {
    batches: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for LengthProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let n = self.batches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30u64.saturating_sub(n as u64 * 10))).await;
        Ok(texts
            .iter()
            .map(|t| vec![t.chars().count() as f32, 1.0])
            .collect())
    }

    fn name(&self) -> &'static str {
        "length"
    }
}

struct FailingProvider;

#[async_trait]
impl EmbeddingProvider for FailingProvider {
    async fn embed_texts(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(RequestError::Connection("refused".to_string()).into())
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

#[tokio::test]
async fn test_batch_preserves_input_order() {
    init_tracing();
    let service = EmbeddingService::new(
        Arc::new(LengthProvider {
            batches: AtomicUsize::new(0),
        }),
        Arc::new(EmbeddingCache::new(100)),
        EmbeddingServiceConfig {
            batch_size: 2,
            max_concurrent_batches: 3,
            dimension: None,
        },
    );

    let texts: Vec<String> = ["a", "bb", "ccc", "dddd", "eeeee"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let vectors = service.embed_batch(&texts).await.unwrap();

    let lengths: Vec<f32> = vectors.iter().map(|v| v.values[0]).collect();
    assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
}

#[tokio::test]
async fn test_duplicates_and_cached_texts_not_resent() {
    let provider = Arc::new(FixedProvider::new(vec![0.6, 0.8]));
    let service = embedding_service(provider.clone());

    service.embed("Mật khẩu").await.unwrap();
    let texts = vec![
        "mật khẩu".to_string(),
        "Tường lửa".to_string(),
        "tường lửa ".to_string(),
    ];
    let vectors = service.embed_batch(&texts).await.unwrap();

    assert_eq!(vectors.len(), 3);
    assert_eq!(provider.calls(), 2);
    assert_eq!(provider.texts_seen(), 2);
}

#[tokio::test]
async fn test_embed_is_idempotent() {
    let provider = Arc::new(FixedProvider::new(vec![0.3, 0.4]));
    let service = embedding_service(provider.clone());

    let a = service.embed("An toàn thông tin").await.unwrap();
    let b = service.embed("An toàn thông tin").await.unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert!((a.cosine_similarity(&b).unwrap() - 1.0).abs() < 1e-6);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_empty_text_rejected_without_provider_call() {
    let provider = Arc::new(FixedProvider::new(vec![1.0]));
    let service = embedding_service(provider.clone());

    assert_eq!(service.embed("   ").await.unwrap_err(), EmbeddingError::EmptyInput);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_provider_failure_leaves_cache_empty() {
    let service = embedding_service(Arc::new(FailingProvider));

    let err = service.embed("xin chào").await.unwrap_err();

    assert!(matches!(
        err,
        EmbeddingError::Provider(RequestError::Connection(_))
    ));
    assert!(service.cache().is_empty());
}

#[tokio::test]
async fn test_non_finite_vector_rejected() {
    let service = embedding_service(Arc::new(FixedProvider::new(vec![f32::NAN, 1.0])));
    let err = service.embed("xin chào").await.unwrap_err();
    assert!(matches!(err, EmbeddingError::InvalidVector(_)));
}

#[tokio::test]
async fn test_configured_dimension_enforced() {
    let service = EmbeddingService::new(
        Arc::new(FixedProvider::new(vec![1.0, 0.0, 0.0])),
        Arc::new(EmbeddingCache::new(10)),
        EmbeddingServiceConfig {
            dimension: Some(384),
            ..Default::default()
        },
    );

    let err = service.embed("xin chào").await.unwrap_err();
    assert_eq!(
        err,
        EmbeddingError::DimensionMismatch {
            expected: 384,
            actual: 3
        }
    );
}

#[test]
fn test_cache_evicts_least_recently_used() {
    use rag_chat_client::embedding::EmbeddingVector;

    let cache = EmbeddingCache::new(2);
    cache.insert("a", Arc::new(EmbeddingVector::new(vec![1.0], "a")));
    cache.insert("b", Arc::new(EmbeddingVector::new(vec![2.0], "b")));
    assert!(cache.get("a").is_some());
    cache.insert("c", Arc::new(EmbeddingVector::new(vec![3.0], "c")));

    assert!(cache.contains("a"));
    assert!(!cache.contains("b"));
    assert!(cache.contains("c"));
    assert_eq!(cache.stats().capacity, 2);
}
