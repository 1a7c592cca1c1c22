// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod pipeline;
pub mod session;
pub mod stream;
pub mod transport;
pub mod version;

// Re-export main types
pub use api::{BackendClient, GenerationRequest};
pub use config::{ClientConfig, ConfigError, Locale};
pub use embedding::{
    Corpus, CorpusChunk, EmbeddingCache, EmbeddingError, EmbeddingProvider, EmbeddingService,
    EmbeddingVector, RetrievedChunk,
};
pub use pipeline::{
    Generator, PipelineError, PipelineEvent, PipelineState, QueryConfig, RagPipeline, RagResult,
};
pub use session::{ChatSession, ChatStore, InMemoryChatStore, SessionError, SessionReply};
pub use stream::{StreamDecoder, StreamError, StreamEvent};
pub use transport::{HttpTransport, RequestError, ResilientClient, RetryPolicy};
