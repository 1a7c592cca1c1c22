// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Wire types for the backend RAG/chat API

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub ready: Option<bool>,
    #[serde(default)]
    pub total_documents: Option<u64>,
    #[serde(default)]
    pub total_chunks: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl HealthResponse {
    /// The server answers 200 even while unhealthy; the status field decides
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.as_str(), "healthy" | "ok") && self.ready != Some(false)
    }
}

/// Server-side RAG chat request (`POST /chat`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub top_k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_category: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            chat_id: None,
            user_id: None,
            session_id: None,
            top_k: 5,
            filter_category: None,
        }
    }
}

/// Source document cited by a server-side answer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceInfo {
    pub filename: String,
    pub display_name: String,
    pub category: String,
    pub content_preview: String,
    pub similarity_score: f32,
    pub content_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub message_id: i64,
    pub chat_id: i64,
    #[serde(default)]
    pub user_message: String,
    pub ai_response: String,
    #[serde(default)]
    pub sources: Vec<SourceInfo>,
    #[serde(default)]
    pub total_sources: usize,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub processing_time_ms: u64,
    #[serde(default)]
    pub timestamp: String,
}

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Zero-based offset of the first item on this page
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.per_page as usize
    }

    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("page", self.page.to_string()),
            ("per_page", self.per_page.to_string()),
        ]
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
        }
    }
}

/// Filters for `GET /chats`
#[derive(Debug, Clone, PartialEq)]
pub struct ChatListQuery {
    pub page: Page,
    pub user_id: Option<i64>,
    pub category_filter: Option<String>,
}

impl ChatListQuery {
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = self.page.to_query();
        if let Some(user_id) = self.user_id {
            query.push(("user_id", user_id.to_string()));
        }
        if let Some(category) = &self.category_filter {
            query.push(("category_filter", category.clone()));
        }
        query
    }
}

impl Default for ChatListQuery {
    fn default() -> Self {
        Self {
            page: Page::new(1, 20),
            user_id: None,
            category_filter: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MessageStats {
    pub user: u32,
    pub assistant: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatStats {
    pub message_stats: MessageStats,
    pub sources_used: u32,
    pub avg_confidence: f32,
    pub last_message_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSummary {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub category_filter: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub stats: ChatStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatListResponse {
    pub chats: Vec<ChatSummary>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourcesInfo {
    pub total_sources: usize,
    pub confidence: f32,
    pub method: Option<String>,
    pub sources: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: i64,
    pub chat_id: i64,
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub sources_info: Option<SourcesInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessagesResponse {
    pub messages: Vec<ChatMessage>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// Fields to change on a chat; at least one must be set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatUpdate {
    pub title: Option<String>,
    pub is_active: Option<bool>,
}

impl ChatUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.is_active.is_none()
    }

    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(title) = &self.title {
            query.push(("title", title.clone()));
        }
        if let Some(is_active) = self.is_active {
            query.push(("is_active", is_active.to_string()));
        }
        query
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdatedChat {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatUpdateResponse {
    pub message: String,
    pub chat: UpdatedChat,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeleteChatResponse {
    pub message: String,
    #[serde(default)]
    pub success: bool,
}

/// Generation request for `/chat/enhanced` and its streaming variant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
}

impl GenerationRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            context: None,
            max_tokens: 512,
            temperature: 0.7,
            top_k: 50,
            top_p: 0.95,
        }
    }

    /// Attach grounding context; an empty context is omitted
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.context = if context.is_empty() { None } else { Some(context) };
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_status() -> String {
    "success".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingRequest {
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingResponse {
    pub embeddings: Vec<Vec<f32>>,
}
