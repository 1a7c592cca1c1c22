// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Chat session coordination
//!
//! Maps pipeline results onto persisted chat history. Persistence is
//! awaited but never retried, and a persistence failure never discards an
//! answer that was already generated.

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use super::store::{ChatStore, MessageRole, NewMessage, SessionError, StoredMessage};
use crate::api::Page;
use crate::pipeline::{PipelineError, PipelineEvent, QueryConfig, RagPipeline, RagResult};

/// Answer plus the outcome of persisting it
#[derive(Debug, Clone)]
pub struct SessionReply {
    pub result: RagResult,
    pub chat_id: Option<i64>,
    pub user_message_id: Option<i64>,
    pub assistant_message_id: Option<i64>,
    /// Set when the answer could not be saved
    pub persistence_error: Option<SessionError>,
}

pub struct ChatSession {
    pipeline: Arc<RagPipeline>,
    store: Arc<dyn ChatStore>,
    config: QueryConfig,
    session_id: String,
    chat_id: Option<i64>,
    parent: Option<CancellationToken>,
    cancel: CancellationToken,
}

impl ChatSession {
    pub fn new(pipeline: Arc<RagPipeline>, store: Arc<dyn ChatStore>, config: QueryConfig) -> Self {
        Self {
            pipeline,
            store,
            config,
            session_id: Uuid::new_v4().to_string(),
            chat_id: None,
            parent: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Derive every query token from `parent` (e.g. the backend client's
    /// lifetime token) so shutting it down cancels the session too
    pub fn with_parent_token(mut self, parent: CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self.parent = Some(parent);
        self
    }

    /// Continue an existing chat
    pub fn with_chat_id(mut self, chat_id: i64) -> Self {
        self.chat_id = Some(chat_id);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn chat_id(&self) -> Option<i64> {
        self.chat_id
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Token of the in-flight query, for teardown from other tasks
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Abandon the current chat, cancelling any query still running
    pub fn new_chat(&mut self) {
        self.cancel.cancel();
        self.cancel = match &self.parent {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        self.chat_id = None;
        info!(session_id = %self.session_id, "Started new chat");
    }

    /// Answer `text` and record both sides of the exchange
    pub async fn ask(
        &mut self,
        text: &str,
        events: Option<&UnboundedSender<PipelineEvent>>,
    ) -> Result<SessionReply, PipelineError> {
        let cancel = self.cancel.clone();
        let result = self
            .pipeline
            .process_query(text, &self.config, events, &cancel)
            .await?;

        let mut reply = SessionReply {
            result,
            chat_id: self.chat_id,
            user_message_id: None,
            assistant_message_id: None,
            persistence_error: None,
        };

        if let Err(e) = self.persist_exchange(text, &mut reply).await {
            warn!(
                code = e.error_code(),
                chat_id = ?self.chat_id,
                "Failed to persist chat messages: {}",
                e
            );
            reply.persistence_error = Some(e);
        }

        Ok(reply)
    }

    async fn persist_exchange(
        &mut self,
        text: &str,
        reply: &mut SessionReply,
    ) -> Result<(), SessionError> {
        let user = self
            .store
            .persist(NewMessage {
                chat_id: self.chat_id,
                session_id: self.session_id.clone(),
                role: MessageRole::User,
                content: text.to_string(),
                sources: Vec::new(),
                confidence: None,
                processing_time_ms: None,
            })
            .await?;
        self.chat_id = Some(user.chat_id);
        reply.chat_id = Some(user.chat_id);
        reply.user_message_id = Some(user.message_id);

        let assistant = self
            .store
            .persist(NewMessage {
                chat_id: Some(user.chat_id),
                session_id: self.session_id.clone(),
                role: MessageRole::Assistant,
                content: reply.result.response_text.clone(),
                sources: reply.result.sources.clone(),
                confidence: Some(reply.result.confidence),
                processing_time_ms: Some(reply.result.processing_time_ms),
            })
            .await?;
        reply.assistant_message_id = Some(assistant.message_id);
        Ok(())
    }

    /// History of the current chat; empty before the first exchange
    pub async fn history(&self, page: Page) -> Result<Vec<StoredMessage>, SessionError> {
        match self.chat_id {
            Some(chat_id) => self.store.load_history(chat_id, page).await,
            None => Ok(Vec::new()),
        }
    }
}
