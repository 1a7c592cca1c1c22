// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! RAG pipeline orchestration
//!
//! Drives one query through search -> embed -> retrieve -> rerank ->
//! generate. Each call owns a fresh `StateMachine`; the embedding cache and
//! corpus are the only shared state and are only read here.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::context::{build_context, confidence, rerank, ContextLimits};
use super::errors::PipelineError;
use super::generator::Generator;
use super::query::Query;
use super::state::{PipelineState, StateMachine};
use crate::api::GenerationRequest;
use crate::config::ClientConfig;
use crate::embedding::{search, Corpus, EmbeddingService, RetrievedChunk};
use crate::stream::collect_tokens;

/// Per-query options
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConfig {
    pub top_k: usize,
    pub similarity_threshold: f32,
    pub rag_enabled: bool,
    pub streaming: bool,
    pub rerank: bool,
}

impl QueryConfig {
    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            top_k: config.top_k,
            similarity_threshold: config.similarity_threshold,
            rag_enabled: config.rag_enabled,
            streaming: config.streaming,
            rerank: config.rerank,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: 0.7,
            rag_enabled: true,
            streaming: true,
            rerank: true,
        }
    }
}

/// Progress notifications for UI layers
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Progress { state: PipelineState, percent: u8 },
    Token(String),
}

/// Completed answer for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagResult {
    pub response_text: String,
    pub sources: Vec<RetrievedChunk>,
    pub sources_used: usize,
    pub confidence: f32,
    pub processing_time_ms: u64,
    pub state_history: Vec<PipelineState>,
    pub query: Query,
}

pub struct RagPipeline {
    embeddings: Arc<EmbeddingService>,
    corpus: Arc<Corpus>,
    generator: Arc<dyn Generator>,
    limits: ContextLimits,
}

impl RagPipeline {
    pub fn new(
        embeddings: Arc<EmbeddingService>,
        corpus: Arc<Corpus>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            embeddings,
            corpus,
            generator,
            limits: ContextLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ContextLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    /// Process one query to completion or error
    ///
    /// # Arguments
    /// * `text` - The user's message
    /// * `config` - Retrieval and generation options
    /// * `events` - Optional sink for progress and streamed tokens
    /// * `cancel` - Per-query token; cancelling ends the query in `error`
    pub async fn process_query(
        &self,
        text: &str,
        config: &QueryConfig,
        events: Option<&UnboundedSender<PipelineEvent>>,
        cancel: &CancellationToken,
    ) -> Result<RagResult, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::InvalidQuery("query is empty".to_string()));
        }

        let start = Instant::now();
        let mut run = QueryRun {
            machine: StateMachine::new(),
            events,
            cancel,
        };
        let query = Query::parse(text);

        match self.run(&query, config, &mut run).await {
            Ok((response_text, sources)) => {
                run.advance(PipelineState::Completed)?;
                let processing_time_ms = start.elapsed().as_millis() as u64;
                let result = RagResult {
                    sources_used: sources.len(),
                    confidence: confidence(&sources),
                    response_text,
                    sources,
                    processing_time_ms,
                    state_history: run.machine.history().to_vec(),
                    query,
                };

                info!(
                    sources = result.sources_used,
                    confidence = result.confidence,
                    "Query completed in {}ms",
                    processing_time_ms
                );
                Ok(result)
            }
            Err(e) => {
                let failed_in = run.machine.state();
                let percent = run.machine.fail();
                run.emit(PipelineEvent::Progress {
                    state: PipelineState::Error,
                    percent,
                });

                if e == PipelineError::Cancelled {
                    info!(state = %failed_in, "Query cancelled");
                } else {
                    warn!(
                        state = %failed_in,
                        code = e.error_code(),
                        "Query failed: {}",
                        e
                    );
                }
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        query: &Query,
        config: &QueryConfig,
        run: &mut QueryRun<'_>,
    ) -> Result<(String, Vec<RetrievedChunk>), PipelineError> {
        if !config.rag_enabled {
            run.advance(PipelineState::Generating)?;
            let request = GenerationRequest::new(&query.raw_text);
            let response = self.generate(&request, config, run).await?;
            return Ok((response, Vec::new()));
        }

        run.advance(PipelineState::Searching)?;
        debug!(
            intent = ?query.detected_intent,
            keywords = ?query.keywords,
            "Query analysed"
        );

        run.advance(PipelineState::Embedding)?;
        let vector = tokio::select! {
            biased;
            _ = run.cancel.cancelled() => return Err(PipelineError::Cancelled),
            embedded = self.embeddings.embed(&query.normalized_text) => {
                embedded.map_err(PipelineError::from_embedding)?
            }
        };

        run.advance(PipelineState::Retrieving)?;
        let mut sources = search(
            &vector,
            self.corpus.chunks(),
            config.top_k,
            config.similarity_threshold,
        )
        .map_err(PipelineError::Retrieval)?;
        if config.rerank {
            sources = rerank(sources, query);
        }
        if sources.is_empty() {
            debug!("No chunks above threshold, generating without context");
        }

        run.advance(PipelineState::Generating)?;
        let context = build_context(&sources, self.limits);
        let request = GenerationRequest::new(&query.raw_text).with_context(context);
        let response = self.generate(&request, config, run).await?;

        Ok((response, sources))
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        config: &QueryConfig,
        run: &QueryRun<'_>,
    ) -> Result<String, PipelineError> {
        if !config.streaming {
            return Ok(self.generator.generate(request, run.cancel).await?);
        }

        let stream = self.generator.generate_stream(request, run.cancel).await?;
        let summary = collect_tokens(stream, run.cancel, |token| {
            run.emit(PipelineEvent::Token(token.to_string()));
        })
        .await?;
        Ok(summary.text)
    }
}

/// Mutable state of one in-flight query
struct QueryRun<'a> {
    machine: StateMachine,
    events: Option<&'a UnboundedSender<PipelineEvent>>,
    cancel: &'a CancellationToken,
}

impl QueryRun<'_> {
    fn advance(&mut self, next: PipelineState) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() && next != PipelineState::Completed {
            return Err(PipelineError::Cancelled);
        }
        let percent = self.machine.transition(next)?;
        self.emit(PipelineEvent::Progress {
            state: next,
            percent,
        });
        Ok(())
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = self.events {
            // Receiver may be gone after a UI teardown
            let _ = tx.send(event);
        }
    }
}
