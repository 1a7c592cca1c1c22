// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Chat history persistence boundary
//!
//! The real store lives behind the backend; `InMemoryChatStore` keeps
//! history for the lifetime of the process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::api::Page;
use crate::config::Locale;
use crate::embedding::RetrievedChunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Message to persist; a `None` chat id starts a new chat
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub chat_id: Option<i64>,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub sources: Vec<RetrievedChunk>,
    pub confidence: Option<f32>,
    pub processing_time_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedMessage {
    pub message_id: i64,
    pub chat_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub message_id: i64,
    pub chat_id: i64,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub sources: Vec<RetrievedChunk>,
    pub confidence: Option<f32>,
    pub processing_time_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Chat {0} not found")]
    ChatNotFound(i64),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl SessionError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::ChatNotFound(_) => "CHAT_NOT_FOUND",
            SessionError::Storage(_) => "STORAGE_FAILURE",
        }
    }

    pub fn user_message(&self, locale: Locale) -> String {
        match (self, locale) {
            (SessionError::ChatNotFound(id), Locale::Vietnamese) => {
                format!("Chat {} không tồn tại", id)
            }
            (SessionError::ChatNotFound(id), Locale::English) => {
                format!("Chat {} does not exist", id)
            }
            (SessionError::Storage(_), Locale::Vietnamese) => {
                "Không thể lưu lịch sử trò chuyện.".to_string()
            }
            (SessionError::Storage(_), Locale::English) => {
                "Failed to save chat history.".to_string()
            }
        }
    }
}

/// Persisted chat history
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn persist(&self, message: NewMessage) -> Result<PersistedMessage, SessionError>;

    /// Messages of `chat_id` in creation order, one page at a time
    async fn load_history(
        &self,
        chat_id: i64,
        page: Page,
    ) -> Result<Vec<StoredMessage>, SessionError>;
}

#[derive(Debug, Default)]
struct StoreInner {
    next_chat_id: i64,
    next_message_id: i64,
    chats: HashMap<i64, Vec<StoredMessage>>,
}

#[derive(Debug, Default)]
pub struct InMemoryChatStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chat_count(&self) -> usize {
        self.inner.read().map(|inner| inner.chats.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn persist(&self, message: NewMessage) -> Result<PersistedMessage, SessionError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| SessionError::Storage("store lock poisoned".to_string()))?;

        let chat_id = match message.chat_id {
            Some(id) if inner.chats.contains_key(&id) => id,
            Some(id) => return Err(SessionError::ChatNotFound(id)),
            None => {
                inner.next_chat_id += 1;
                let id = inner.next_chat_id;
                inner.chats.insert(id, Vec::new());
                debug!("Created chat {}", id);
                id
            }
        };

        inner.next_message_id += 1;
        let message_id = inner.next_message_id;
        let stored = StoredMessage {
            message_id,
            chat_id,
            session_id: message.session_id,
            role: message.role,
            content: message.content,
            sources: message.sources,
            confidence: message.confidence,
            processing_time_ms: message.processing_time_ms,
            created_at: Utc::now(),
        };

        if let Some(messages) = inner.chats.get_mut(&chat_id) {
            messages.push(stored);
        }

        Ok(PersistedMessage {
            message_id,
            chat_id,
        })
    }

    async fn load_history(
        &self,
        chat_id: i64,
        page: Page,
    ) -> Result<Vec<StoredMessage>, SessionError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| SessionError::Storage("store lock poisoned".to_string()))?;

        let messages = inner
            .chats
            .get(&chat_id)
            .ok_or(SessionError::ChatNotFound(chat_id))?;

        Ok(messages
            .iter()
            .skip(page.offset())
            .take(page.per_page as usize)
            .cloned()
            .collect())
    }
}
