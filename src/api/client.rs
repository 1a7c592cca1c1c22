// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Typed client for the backend RAG/chat API
//!
//! All calls go through one `HttpTransport`, so they share the same retry
//! policy and attempt counters. The client owns a lifetime cancellation
//! token; per-query tokens are derived from it with `child_token`, so
//! `shutdown` tears down every in-flight call.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::types::{
    ChatListQuery, ChatListResponse, ChatMessagesResponse, ChatRequest, ChatResponse,
    ChatUpdate, ChatUpdateResponse, DeleteChatResponse, EmbeddingRequest, EmbeddingResponse,
    GenerationRequest, GenerationResponse, HealthResponse, Page,
};
use crate::config::ClientConfig;
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::pipeline::Generator;
use crate::stream::{spawn_event_reader, EventStream};
use crate::transport::{HttpTransport, RequestError, RequestOptions, RequestStats};

#[derive(Clone)]
pub struct BackendClient {
    transport: HttpTransport,
    lifetime: CancellationToken,
}

impl BackendClient {
    pub fn new(base_url: &str, options: RequestOptions) -> Result<Self, RequestError> {
        Ok(Self {
            transport: HttpTransport::new(base_url, options)?,
            lifetime: CancellationToken::new(),
        })
    }

    /// Build a client from validated configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self, RequestError> {
        Self::new(
            &config.api_base_url,
            RequestOptions::new(config.retry_policy()),
        )
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    pub fn stats(&self) -> RequestStats {
        self.transport.stats()
    }

    /// Token for one query; cancelled by `shutdown` as well as by its owner
    pub fn child_token(&self) -> CancellationToken {
        self.lifetime.child_token()
    }

    /// Cancel every in-flight call made through this client
    pub fn shutdown(&self) {
        info!("Shutting down backend client");
        self.lifetime.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.lifetime.is_cancelled()
    }

    /// Liveness probe
    pub async fn health(&self) -> Result<HealthResponse, RequestError> {
        self.transport.get_json("/health", &[], &self.lifetime).await
    }

    /// Poll `/health` until the server reports healthy or `max_wait` elapses
    ///
    /// Transport failures are already retried inside each probe; this loop
    /// additionally waits out a server that answers but is still starting.
    pub async fn wait_until_healthy(
        &self,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Result<HealthResponse, RequestError> {
        let deadline = Instant::now() + max_wait;
        loop {
            let health = self.health().await?;
            if health.is_healthy() {
                info!("Backend healthy at {}", self.base_url());
                return Ok(health);
            }

            if Instant::now() + poll_interval > deadline {
                return Err(RequestError::Server {
                    status: 503,
                    message: health
                        .error
                        .unwrap_or_else(|| format!("Backend status: {}", health.status)),
                });
            }

            warn!(status = %health.status, "Backend not ready, waiting");
            tokio::select! {
                biased;
                _ = self.lifetime.cancelled() => return Err(RequestError::Cancelled),
                _ = sleep(poll_interval) => {}
            }
        }
    }

    /// Server-side RAG chat
    pub async fn send_chat(&self, request: &ChatRequest) -> Result<ChatResponse, RequestError> {
        if request.message.trim().is_empty() {
            return Err(RequestError::InvalidRequest(
                "message must not be empty".to_string(),
            ));
        }
        self.transport.post_json("/chat", request, &self.lifetime).await
    }

    pub async fn list_chats(&self, query: &ChatListQuery) -> Result<ChatListResponse, RequestError> {
        self.transport
            .get_json("/chats", &query.to_query(), &self.lifetime)
            .await
    }

    pub async fn chat_messages(
        &self,
        chat_id: i64,
        page: Page,
    ) -> Result<ChatMessagesResponse, RequestError> {
        self.transport
            .get_json(
                &format!("/chats/{}/messages", chat_id),
                &page.to_query(),
                &self.lifetime,
            )
            .await
    }

    /// Rename a chat or change its active flag
    pub async fn update_chat(
        &self,
        chat_id: i64,
        update: &ChatUpdate,
    ) -> Result<ChatUpdateResponse, RequestError> {
        if update.is_empty() {
            return Err(RequestError::InvalidRequest(
                "nothing to update: set a title or the active flag".to_string(),
            ));
        }
        self.transport
            .put_json(
                &format!("/chats/{}", chat_id),
                &update.to_query(),
                &self.lifetime,
            )
            .await
    }

    pub async fn delete_chat(&self, chat_id: i64) -> Result<DeleteChatResponse, RequestError> {
        self.transport
            .delete_json(&format!("/chats/{}", chat_id), &self.lifetime)
            .await
    }
}

#[async_trait]
impl Generator for BackendClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, RequestError> {
        let reply: GenerationResponse = self
            .transport
            .post_json("/chat/enhanced", request, cancel)
            .await?;

        if reply.status == "error" {
            return Err(RequestError::Server {
                status: 200,
                message: reply
                    .error
                    .unwrap_or_else(|| "Generation failed".to_string()),
            });
        }
        Ok(reply.response)
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<EventStream, RequestError> {
        let body = self
            .transport
            .post_stream("/chat/enhanced/stream", request, cancel)
            .await?;
        Ok(spawn_event_reader(
            body,
            cancel.clone(),
            self.transport.timeout(),
        ))
    }
}

#[async_trait]
impl EmbeddingProvider for BackendClient {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = EmbeddingRequest {
            texts: texts.to_vec(),
        };
        let response: EmbeddingResponse = self
            .transport
            .post_json("/embeddings", &request, &self.lifetime)
            .await?;
        Ok(response.embeddings)
    }

    fn name(&self) -> &'static str {
        "backend"
    }
}
