// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! RAG query pipeline
//!
//! A forward-only state machine sequencing query analysis, embedding,
//! retrieval, reranking and generation, with progress reporting.

pub mod context;
pub mod errors;
pub mod generator;
pub mod orchestrator;
pub mod query;
pub mod state;

pub use context::{build_context, confidence, rerank, truncate_chars, ContextLimits};
pub use errors::PipelineError;
pub use generator::Generator;
pub use orchestrator::{PipelineEvent, QueryConfig, RagPipeline, RagResult};
pub use query::{Query, QueryIntent};
pub use state::{PipelineState, StateMachine};
