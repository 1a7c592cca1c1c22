// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod client;
pub mod types;

pub use client::BackendClient;
pub use types::{
    ChatListQuery, ChatListResponse, ChatMessage, ChatMessagesResponse, ChatRequest,
    ChatResponse, ChatStats, ChatSummary, ChatUpdate, ChatUpdateResponse, DeleteChatResponse,
    EmbeddingRequest, EmbeddingResponse, GenerationRequest, GenerationResponse, HealthResponse,
    MessageStats, Page, SourceInfo, SourcesInfo, UpdatedChat,
};
