// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Generation and embedding calls of BackendClient

use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rag_chat_client::api::{BackendClient, GenerationRequest};
use rag_chat_client::embedding::{
    EmbeddingCache, EmbeddingError, EmbeddingProvider, EmbeddingService, EmbeddingServiceConfig,
};
use rag_chat_client::pipeline::Generator;
use rag_chat_client::stream::{collect_tokens, StreamEvent};
use rag_chat_client::transport::RequestError;

use crate::common::fast_options;

async fn client(server: &MockServer) -> BackendClient {
    BackendClient::new(&server.uri(), fast_options()).unwrap()
}

#[tokio::test]
async fn test_generate_sends_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/enhanced"))
        .and(body_partial_json(json!({
            "query": "Mật khẩu mạnh là gì?",
            "context": "Mật khẩu mạnh có ít nhất 12 ký tự.",
            "max_tokens": 512
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Mật khẩu mạnh có ít nhất 12 ký tự.",
            "status": "success"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server).await;
    let request = GenerationRequest::new("Mật khẩu mạnh là gì?")
        .with_context("Mật khẩu mạnh có ít nhất 12 ký tự.");
    let answer = client
        .generate(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(answer, "Mật khẩu mạnh có ít nhất 12 ký tự.");
}

#[tokio::test]
async fn test_generate_error_status_in_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/enhanced"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "",
            "status": "error",
            "error": "LLM unavailable"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server).await;
    let err = client
        .generate(&GenerationRequest::new("q"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RequestError::Server {
            status: 200,
            message: "LLM unavailable".to_string()
        }
    );
}

#[tokio::test]
async fn test_generate_stream_decodes_events() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"type\":\"start\",\"message\":\"Bắt đầu\"}\n\n",
        "data: {\"type\":\"token\",\"content\":\"Xin \"}\n\n",
        "data: {\"type\":\"token\",\"content\":\"chào\"}\n\n",
        "data: {\"type\":\"end\",\"response_length\":8}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/enhanced/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server).await;
    let cancel = CancellationToken::new();
    let stream = client
        .generate_stream(&GenerationRequest::new("Xin chào"), &cancel)
        .await
        .unwrap();

    let mut tokens = Vec::new();
    let summary = collect_tokens(stream, &cancel, |t| tokens.push(t.to_string()))
        .await
        .unwrap();

    assert_eq!(tokens, vec!["Xin ", "chào"]);
    assert_eq!(summary.text, "Xin chào");
    assert_eq!(summary.total_length, 8);
    assert_eq!(summary.start_message.as_deref(), Some("Bắt đầu"));
}

#[tokio::test]
async fn test_generate_stream_in_band_error() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"type\":\"token\",\"content\":\"Xin\"}\n\n",
        "data: {\"type\":\"error\",\"message\":\"Model overloaded\"}\n\n",
        "data: {\"type\":\"token\",\"content\":\"never\"}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/enhanced/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = client(&server).await;
    let stream = client
        .generate_stream(&GenerationRequest::new("q"), &CancellationToken::new())
        .await
        .unwrap();

    let events: Vec<_> = stream.collect().await;
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[1].as_ref().unwrap(),
        &StreamEvent::Error {
            message: "Model overloaded".to_string()
        }
    );
}

#[tokio::test]
async fn test_generate_stream_http_error_is_not_a_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/enhanced/stream"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "boom"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server).await;
    let result = client
        .generate_stream(&GenerationRequest::new("q"), &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(RequestError::Server { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_embed_texts_posts_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(body_json(json!({"texts": ["xin chào", "tạm biệt"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0], [0.0, 1.0]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server).await;
    let vectors = client
        .embed_texts(&["xin chào".to_string(), "tạm biệt".to_string()])
        .await
        .unwrap();

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[tokio::test]
async fn test_embedding_service_over_http_caches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.6, 0.8]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = Arc::new(client(&server).await);
    let service = EmbeddingService::new(
        client,
        Arc::new(EmbeddingCache::new(10)),
        EmbeddingServiceConfig::default(),
    );

    let first = service.embed("Mật khẩu").await.unwrap();
    let second = service.embed("  mật khẩu ").await.unwrap();

    assert_eq!(first.values, second.values);
    assert_eq!(service.cache().stats().hits, 1);
}

#[tokio::test]
async fn test_embedding_count_mismatch_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.6, 0.8]]
        })))
        .mount(&server)
        .await;

    let client = Arc::new(client(&server).await);
    let service = EmbeddingService::new(
        client,
        Arc::new(EmbeddingCache::new(10)),
        EmbeddingServiceConfig::default(),
    );

    let err = service
        .embed_batch(&["một".to_string(), "hai".to_string()])
        .await
        .unwrap_err();

    assert_eq!(
        err,
        EmbeddingError::CountMismatch {
            expected: 2,
            actual: 1
        }
    );
}
