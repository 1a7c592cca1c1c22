// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// End-to-end query processing with fake embedding and generation backends

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use rag_chat_client::pipeline::{PipelineEvent, PipelineState, QueryConfig};

use crate::common::{
    chunk, corpus, init_tracing, pipeline, vector_with_similarity, FixedProvider,
    ScriptedGenerator,
};

const SECURITY_TEXT: &str = "An toàn thông tin là việc bảo vệ dữ liệu khỏi truy cập trái phép.";
const WEATHER_TEXT: &str = "Dự báo thời tiết hôm nay có mưa.";

fn drain(rx: &mut mpsc::UnboundedReceiver<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn progress(events: &[PipelineEvent]) -> Vec<(PipelineState, u8)> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Progress { state, percent } => Some((*state, *percent)),
            PipelineEvent::Token(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn test_question_retrieves_relevant_chunk_only() {
    init_tracing();
    let generator = Arc::new(ScriptedGenerator::new(
        &["An toàn ", "thông tin ", "là bảo vệ dữ liệu."],
        Duration::from_millis(1),
    ));
    let pipeline = pipeline(
        Arc::new(FixedProvider::new(vec![1.0, 0.0])),
        corpus(vec![
            chunk("security.md", SECURITY_TEXT, vector_with_similarity(0.95)),
            chunk("weather.md", WEATHER_TEXT, vector_with_similarity(0.60)),
        ]),
        generator.clone(),
    );
    let config = QueryConfig {
        top_k: 5,
        similarity_threshold: 0.7,
        rerank: false,
        ..Default::default()
    };
    let (tx, mut rx) = mpsc::unbounded_channel();

    let result = pipeline
        .process_query(
            "An toàn thông tin là gì?",
            &config,
            Some(&tx),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.sources.len(), 1);
    assert_eq!(result.sources[0].source_id, "security.md");
    assert_eq!(result.sources[0].rank, 0);
    assert!((result.sources[0].similarity - 0.95).abs() < 1e-4);
    assert_eq!(result.sources_used, 1);
    assert!((result.confidence - 0.95).abs() < 1e-4);
    assert_eq!(result.response_text, "An toàn thông tin là bảo vệ dữ liệu.");
    assert_eq!(result.query.keywords, vec!["toàn", "thông", "tin"]);

    let request = generator.last_request().unwrap();
    assert_eq!(request.query, "An toàn thông tin là gì?");
    let context = request.context.unwrap();
    assert!(context.contains(SECURITY_TEXT));
    assert!(!context.contains(WEATHER_TEXT));

    let events = drain(&mut rx);
    assert_eq!(
        progress(&events),
        vec![
            (PipelineState::Searching, 20),
            (PipelineState::Embedding, 40),
            (PipelineState::Retrieving, 60),
            (PipelineState::Generating, 80),
            (PipelineState::Completed, 100),
        ]
    );
    let tokens: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Token(t) => Some(t.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(tokens, vec!["An toàn ", "thông tin ", "là bảo vệ dữ liệu."]);

    assert_eq!(
        result.state_history,
        vec![
            PipelineState::Idle,
            PipelineState::Searching,
            PipelineState::Embedding,
            PipelineState::Retrieving,
            PipelineState::Generating,
            PipelineState::Completed,
        ]
    );
}

#[tokio::test]
async fn test_rerank_boosts_keyword_matches() {
    let pipeline = pipeline(
        Arc::new(FixedProvider::new(vec![1.0, 0.0])),
        corpus(vec![
            chunk("generic.md", "Một đoạn văn bản chung.", vector_with_similarity(0.90)),
            chunk("security.md", SECURITY_TEXT, vector_with_similarity(0.80)),
        ]),
        Arc::new(ScriptedGenerator::new(&["ok"], Duration::from_millis(1))),
    );
    let config = QueryConfig {
        rerank: true,
        ..Default::default()
    };

    let result = pipeline
        .process_query(
            "An toàn thông tin là gì?",
            &config,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.sources[0].source_id, "security.md");
    assert_eq!(result.sources[0].rank, 0);
    assert_eq!(result.sources[0].similarity, 1.0);
    assert!((result.sources[0].raw_score - 0.80).abs() < 1e-4);
    assert_eq!(result.sources[1].source_id, "generic.md");
    assert_eq!(result.sources[1].rank, 1);
}

#[tokio::test]
async fn test_rag_disabled_skips_retrieval() {
    let provider = Arc::new(FixedProvider::new(vec![1.0, 0.0]));
    let generator = Arc::new(ScriptedGenerator::new(&["Xin ", "chào"], Duration::from_millis(1)));
    let pipeline = pipeline(
        provider.clone(),
        corpus(vec![chunk("a", SECURITY_TEXT, vector_with_similarity(0.99))]),
        generator.clone(),
    );
    let config = QueryConfig {
        rag_enabled: false,
        ..Default::default()
    };
    let (tx, mut rx) = mpsc::unbounded_channel();

    let result = pipeline
        .process_query("Xin chào", &config, Some(&tx), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        result.state_history,
        vec![
            PipelineState::Idle,
            PipelineState::Generating,
            PipelineState::Completed
        ]
    );
    assert!(result.sources.is_empty());
    assert_eq!(result.confidence, 0.0);
    assert_eq!(provider.calls(), 0);
    assert!(generator.last_request().unwrap().context.is_none());
    assert_eq!(
        progress(&drain(&mut rx)),
        vec![
            (PipelineState::Generating, 80),
            (PipelineState::Completed, 100)
        ]
    );
}

#[tokio::test]
async fn test_no_chunk_above_threshold_generates_without_context() {
    let generator = Arc::new(ScriptedGenerator::new(&["Không rõ"], Duration::from_millis(1)));
    let pipeline = pipeline(
        Arc::new(FixedProvider::new(vec![1.0, 0.0])),
        corpus(vec![chunk("weather.md", WEATHER_TEXT, vector_with_similarity(0.3))]),
        generator.clone(),
    );

    let result = pipeline
        .process_query(
            "An toàn thông tin là gì?",
            &QueryConfig::default(),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.sources.is_empty());
    assert_eq!(result.sources_used, 0);
    assert_eq!(result.response_text, "Không rõ");
    assert!(generator.last_request().unwrap().context.is_none());
}

#[tokio::test]
async fn test_blocking_generation_emits_no_tokens() {
    let pipeline = pipeline(
        Arc::new(FixedProvider::new(vec![1.0, 0.0])),
        corpus(vec![chunk("a", SECURITY_TEXT, vector_with_similarity(0.95))]),
        Arc::new(ScriptedGenerator::new(&["Trả ", "lời"], Duration::from_millis(1))),
    );
    let config = QueryConfig {
        streaming: false,
        ..Default::default()
    };
    let (tx, mut rx) = mpsc::unbounded_channel();

    let result = pipeline
        .process_query("Mật khẩu", &config, Some(&tx), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.response_text, "Trả lời");
    assert!(drain(&mut rx)
        .iter()
        .all(|e| matches!(e, PipelineEvent::Progress { .. })));
}

#[tokio::test]
async fn test_repeated_query_hits_embedding_cache() {
    let provider = Arc::new(FixedProvider::new(vec![1.0, 0.0]));
    let pipeline = pipeline(
        provider.clone(),
        corpus(vec![chunk("a", SECURITY_TEXT, vector_with_similarity(0.95))]),
        Arc::new(ScriptedGenerator::new(&["ok"], Duration::from_millis(1))),
    );
    let cancel = CancellationToken::new();

    let first = pipeline
        .process_query("Mật khẩu mạnh?", &QueryConfig::default(), None, &cancel)
        .await
        .unwrap();
    let second = pipeline
        .process_query("mật khẩu   MẠNH", &QueryConfig::default(), None, &cancel)
        .await
        .unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(first.sources, second.sources);
}
