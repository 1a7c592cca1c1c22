// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Persistence failures never cost the user their answer

use async_trait::async_trait;
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;

use rag_chat_client::api::Page;
use rag_chat_client::pipeline::{PipelineError, QueryConfig};
use rag_chat_client::session::{
    ChatSession, ChatStore, MessageRole, NewMessage, PersistedMessage, SessionError,
    StoredMessage,
};
use tokio_util::sync::CancellationToken;

use crate::common::{chunk, corpus, pipeline, vector_with_similarity, FixedProvider, ScriptedGenerator};

mock! {
    pub Store {}

    #[async_trait]
    impl ChatStore for Store {
        async fn persist(&self, message: NewMessage) -> Result<PersistedMessage, SessionError>;
        async fn load_history(
            &self,
            chat_id: i64,
            page: Page,
        ) -> Result<Vec<StoredMessage>, SessionError>;
    }
}

fn session(store: MockStore) -> ChatSession {
    let pipeline = pipeline(
        Arc::new(FixedProvider::new(vec![1.0, 0.0])),
        corpus(vec![chunk(
            "firewall.md",
            "Tường lửa lọc lưu lượng mạng.",
            vector_with_similarity(0.9),
        )]),
        Arc::new(ScriptedGenerator::new(
            &["Tường lửa ", "lọc lưu lượng."],
            Duration::from_millis(1),
        )),
    );
    ChatSession::new(pipeline, Arc::new(store), QueryConfig::default())
}

#[tokio::test]
async fn test_assistant_persist_failure_keeps_answer() {
    let mut store = MockStore::new();
    store
        .expect_persist()
        .withf(|m| m.role == MessageRole::User && m.chat_id.is_none())
        .times(1)
        .returning(|_| {
            Ok(PersistedMessage {
                message_id: 1,
                chat_id: 7,
            })
        });
    store
        .expect_persist()
        .withf(|m| m.role == MessageRole::Assistant)
        .times(1)
        .returning(|_| Err(SessionError::Storage("disk full".to_string())));

    let mut session = session(store);
    let reply = session.ask("Tường lửa là gì?", None).await.unwrap();

    assert_eq!(reply.result.response_text, "Tường lửa lọc lưu lượng.");
    assert_eq!(reply.chat_id, Some(7));
    assert_eq!(reply.user_message_id, Some(1));
    assert_eq!(reply.assistant_message_id, None);
    assert_eq!(
        reply.persistence_error,
        Some(SessionError::Storage("disk full".to_string()))
    );
    assert_eq!(session.chat_id(), Some(7));
}

#[tokio::test]
async fn test_user_persist_failure_skips_assistant() {
    let mut store = MockStore::new();
    store
        .expect_persist()
        .withf(|m| m.role == MessageRole::User)
        .times(1)
        .returning(|_| Err(SessionError::Storage("offline".to_string())));
    store
        .expect_persist()
        .withf(|m| m.role == MessageRole::Assistant)
        .times(0);

    let mut session = session(store);
    let reply = session.ask("Tường lửa là gì?", None).await.unwrap();

    assert!(!reply.result.response_text.is_empty());
    assert_eq!(reply.chat_id, None);
    assert!(reply.persistence_error.is_some());
    assert_eq!(session.chat_id(), None);
}

#[tokio::test]
async fn test_assistant_message_carries_sources() {
    let mut store = MockStore::new();
    store
        .expect_persist()
        .withf(|m| m.role == MessageRole::User)
        .returning(|_| {
            Ok(PersistedMessage {
                message_id: 10,
                chat_id: 3,
            })
        });
    store
        .expect_persist()
        .withf(|m| {
            m.role == MessageRole::Assistant
                && m.chat_id == Some(3)
                && m.sources.len() == 1
                && m.sources[0].source_id == "firewall.md"
                && m.confidence.is_some()
                && m.processing_time_ms.is_some()
        })
        .times(1)
        .returning(|_| {
            Ok(PersistedMessage {
                message_id: 11,
                chat_id: 3,
            })
        });

    let mut session = session(store);
    let reply = session.ask("Tường lửa là gì?", None).await.unwrap();

    assert_eq!(reply.assistant_message_id, Some(11));
    assert!(reply.persistence_error.is_none());
}

#[tokio::test]
async fn test_failed_query_persists_nothing() {
    let mut store = MockStore::new();
    store.expect_persist().times(0);

    let parent = CancellationToken::new();
    let mut session = session(store).with_parent_token(parent.clone());
    parent.cancel();

    let err = session.ask("Tường lửa là gì?", None).await.unwrap_err();
    assert_eq!(err, PipelineError::Cancelled);
}
