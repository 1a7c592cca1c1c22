// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Client configuration
//!
//! Everything the transport, embedding and pipeline layers need to know,
//! loaded from environment variables with sane defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::transport::RetryPolicy;

/// Language used for user-facing error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    English,
    #[default]
    Vietnamese,
}

impl FromStr for Locale {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Locale::English),
            "vi" | "vietnamese" => Ok(Locale::Vietnamese),
            other => Err(ConfigError::Invalid {
                field: "locale",
                reason: format!("unsupported locale '{}'", other),
            }),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Configuration for the RAG chat client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend RAG API
    pub api_base_url: String,
    /// Per-attempt request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Total attempts per logical request (first try included)
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Texts per embedding request
    pub embed_batch_size: usize,
    /// Embedding sub-batches allowed in flight at once
    pub embed_max_concurrent_batches: usize,
    /// Maximum cached embedding vectors (LRU)
    pub embed_cache_capacity: usize,
    /// Expected embedding dimension, learned from the first vector if unset
    pub embed_dimension: Option<usize>,
    /// Number of chunks retrieved per query
    pub top_k: usize,
    /// Minimum similarity for a chunk to be retrieved
    pub similarity_threshold: f32,
    /// Whether retrieval runs before generation
    pub rag_enabled: bool,
    /// Whether generation is streamed token by token
    pub streaming: bool,
    /// Whether retrieved chunks are reranked by keyword overlap
    pub rerank: bool,
    /// Maximum grounding context size in characters
    pub max_context_chars: usize,
    /// Maximum characters taken from a single chunk
    pub max_chunk_chars: usize,
    /// Language for user-facing messages
    pub locale: Locale,
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base_url: env::var("RAG_API_URL").unwrap_or(defaults.api_base_url),
            request_timeout_ms: parse_env("RAG_REQUEST_TIMEOUT_MS")
                .unwrap_or(defaults.request_timeout_ms),
            max_attempts: parse_env("RAG_MAX_ATTEMPTS").unwrap_or(defaults.max_attempts),
            retry_delay_ms: parse_env("RAG_RETRY_DELAY_MS").unwrap_or(defaults.retry_delay_ms),
            embed_batch_size: parse_env("RAG_EMBED_BATCH_SIZE")
                .unwrap_or(defaults.embed_batch_size),
            embed_max_concurrent_batches: parse_env("RAG_EMBED_MAX_CONCURRENT_BATCHES")
                .unwrap_or(defaults.embed_max_concurrent_batches),
            embed_cache_capacity: parse_env("RAG_EMBED_CACHE_CAPACITY")
                .unwrap_or(defaults.embed_cache_capacity),
            embed_dimension: parse_env("RAG_EMBED_DIMENSION"),
            top_k: parse_env("RAG_TOP_K").unwrap_or(defaults.top_k),
            similarity_threshold: parse_env("RAG_SIMILARITY_THRESHOLD")
                .unwrap_or(defaults.similarity_threshold),
            rag_enabled: parse_bool_env("RAG_ENABLED").unwrap_or(defaults.rag_enabled),
            streaming: parse_bool_env("RAG_STREAMING").unwrap_or(defaults.streaming),
            rerank: parse_bool_env("RAG_RERANK").unwrap_or(defaults.rerank),
            max_context_chars: parse_env("RAG_MAX_CONTEXT_CHARS")
                .unwrap_or(defaults.max_context_chars),
            max_chunk_chars: parse_env("RAG_MAX_CHUNK_CHARS").unwrap_or(defaults.max_chunk_chars),
            locale: env::var("RAG_LOCALE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.locale),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(e) = url::Url::parse(&self.api_base_url) {
            return Err(invalid("api_base_url", format!("{}", e)));
        }
        if !(1..=20).contains(&self.top_k) {
            return Err(invalid("top_k", "must be between 1 and 20".to_string()));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(invalid(
                "similarity_threshold",
                "must be between 0 and 1".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", "must be greater than 0".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "must be greater than 0".to_string()));
        }
        if self.embed_batch_size == 0 {
            return Err(invalid("embed_batch_size", "must be greater than 0".to_string()));
        }
        if self.embed_max_concurrent_batches == 0 {
            return Err(invalid(
                "embed_max_concurrent_batches",
                "must be greater than 0".to_string(),
            ));
        }
        if self.embed_cache_capacity == 0 {
            return Err(invalid("embed_cache_capacity", "must be greater than 0".to_string()));
        }
        if self.embed_dimension == Some(0) {
            return Err(invalid("embed_dimension", "must be greater than 0".to_string()));
        }
        if self.max_chunk_chars == 0 || self.max_context_chars == 0 {
            return Err(invalid("max_context_chars", "must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Retry policy derived from the timeout and attempt settings
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/v1/rag".to_string(),
            request_timeout_ms: 30_000,
            max_attempts: 3,
            retry_delay_ms: 1_000,
            embed_batch_size: 32,
            embed_max_concurrent_batches: 4,
            embed_cache_capacity: 10_000,
            embed_dimension: None,
            top_k: 5,
            similarity_threshold: 0.7,
            rag_enabled: true,
            streaming: true,
            rerank: true,
            max_context_chars: 3_000,
            max_chunk_chars: 800,
            locale: Locale::Vietnamese,
        }
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_bool_env(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
}
