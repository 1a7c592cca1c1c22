// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::connect;
use crate::api::{BackendClient, ChatRequest};
use crate::config::ClientConfig;
use crate::embedding::{
    Corpus, CorpusChunk, EmbeddingCache, EmbeddingService, EmbeddingServiceConfig,
};
use crate::pipeline::{ContextLimits, PipelineEvent, QueryConfig, RagPipeline};
use crate::session::{ChatSession, InMemoryChatStore};

/// Arguments for the ask command
#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question to answer
    pub query: String,

    /// JSON file with an array of {source_id, text} chunks to search
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Skip retrieval and chat with the model directly
    #[arg(long)]
    pub no_rag: bool,

    /// Wait for the whole answer instead of streaming tokens
    #[arg(long)]
    pub no_stream: bool,

    /// Maximum number of chunks to retrieve (1-20)
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Minimum similarity for a chunk to be used (0-1)
    #[arg(long)]
    pub threshold: Option<f32>,
}

/// Arguments for the send command
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Message to send
    pub message: String,

    /// Continue an existing chat
    #[arg(long)]
    pub chat_id: Option<i64>,

    #[arg(long)]
    pub user_id: Option<i64>,

    #[arg(long)]
    pub session_id: Option<String>,

    /// Number of sources the server should use (1-20)
    #[arg(long, default_value_t = 5)]
    pub top_k: usize,

    /// Restrict sources to one category
    #[arg(long)]
    pub category: Option<String>,
}

/// One entry of a corpus file
#[derive(Debug, Deserialize)]
struct CorpusEntry {
    source_id: String,
    text: String,
}

/// Apply flag overrides on top of configured query options
pub fn query_config(config: &ClientConfig, args: &AskArgs) -> Result<QueryConfig> {
    let mut query = QueryConfig::from_client_config(config);
    if args.no_rag {
        query.rag_enabled = false;
    }
    if args.no_stream {
        query.streaming = false;
    }
    if let Some(top_k) = args.top_k {
        if !(1..=20).contains(&top_k) {
            return Err(anyhow!("--top-k must be between 1 and 20"));
        }
        query.top_k = top_k;
    }
    if let Some(threshold) = args.threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(anyhow!("--threshold must be between 0 and 1"));
        }
        query.similarity_threshold = threshold;
    }
    Ok(query)
}

async fn load_corpus(path: &Path, embeddings: &EmbeddingService) -> Result<Corpus> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read corpus file {}", path.display()))?;
    let entries: Vec<CorpusEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid corpus file {}", path.display()))?;

    let texts: Vec<String> = entries.iter().map(|e| e.text.clone()).collect();
    let vectors = embeddings.embed_batch(&texts).await?;

    let mut corpus = Corpus::new();
    for (entry, vector) in entries.into_iter().zip(vectors) {
        corpus.add(CorpusChunk {
            source_id: entry.source_id,
            text: entry.text,
            vector,
        })?;
    }
    info!("Loaded {} corpus chunks from {}", corpus.len(), path.display());
    Ok(corpus)
}

pub async fn ask(config: &ClientConfig, args: AskArgs) -> Result<()> {
    let locale = config.locale;
    let query_config = query_config(config, &args)?;
    let client = connect(config)?;

    let embeddings = Arc::new(EmbeddingService::new(
        client.clone(),
        Arc::new(EmbeddingCache::new(config.embed_cache_capacity)),
        EmbeddingServiceConfig {
            batch_size: config.embed_batch_size,
            max_concurrent_batches: config.embed_max_concurrent_batches,
            dimension: config.embed_dimension,
        },
    ));

    let corpus = match (&args.corpus, query_config.rag_enabled) {
        (Some(path), true) => load_corpus(path, &embeddings)
            .await
            .map_err(|e| anyhow!("{:#}", e))?,
        (None, true) => {
            warn!("No corpus given; answers will not be grounded");
            Corpus::new()
        }
        (_, false) => Corpus::new(),
    };

    let pipeline = RagPipeline::new(embeddings, Arc::new(corpus), client.clone()).with_limits(
        ContextLimits {
            max_context_chars: config.max_context_chars,
            max_chunk_chars: config.max_chunk_chars,
        },
    );
    let mut session = ChatSession::new(
        Arc::new(pipeline),
        Arc::new(InMemoryChatStore::new()),
        query_config.clone(),
    )
    .with_parent_token(client.child_token());

    let cancel = session.cancel_handle();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::Progress { state, percent } => {
                    debug!(state = %state, percent, "Progress");
                }
                PipelineEvent::Token(token) => {
                    print!("{}", token);
                    let _ = stdout.flush();
                }
            }
        }
    });

    let outcome = session.ask(&args.query, Some(&tx)).await;
    drop(tx);
    let _ = printer.await;

    let reply = outcome.map_err(|e| anyhow!(e.user_message(locale)))?;
    if query_config.streaming {
        println!();
    } else {
        println!("{}", reply.result.response_text);
    }

    if !reply.result.sources.is_empty() {
        println!("\n📚 Sources:");
        for source in &reply.result.sources {
            println!(
                "  [{}] {} (similarity {:.2})",
                source.rank, source.source_id, source.similarity
            );
        }
    }
    println!(
        "\n🎯 Confidence: {:.2}   ⏱️  {}ms",
        reply.result.confidence, reply.result.processing_time_ms
    );
    if let Some(e) = &reply.persistence_error {
        println!("⚠️  {}", e.user_message(locale));
    }
    Ok(())
}

pub async fn send(config: &ClientConfig, args: SendArgs) -> Result<()> {
    let client: Arc<BackendClient> = connect(config)?;
    let request = ChatRequest {
        message: args.message,
        chat_id: args.chat_id,
        user_id: args.user_id,
        session_id: args.session_id,
        top_k: args.top_k,
        filter_category: args.category,
    };

    let response = client
        .send_chat(&request)
        .await
        .map_err(|e| anyhow!(e.user_message(config.locale)))?;

    println!("{}", response.ai_response);
    if !response.sources.is_empty() {
        println!("\n📚 Sources:");
        for source in &response.sources {
            println!(
                "  {} [{}] (similarity {:.2})",
                source.display_name, source.category, source.similarity_score
            );
        }
    }
    println!(
        "\n💬 Chat {} / message {}   🎯 {:.2}   ⏱️  {}ms",
        response.chat_id, response.message_id, response.confidence, response.processing_time_ms
    );
    Ok(())
}
