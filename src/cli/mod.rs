// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod ask;
pub mod chats;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;

use crate::api::BackendClient;
use crate::config::{ClientConfig, Locale};
use crate::version;

/// RAG chat client
#[derive(Parser, Debug)]
#[command(name = "rag-chat")]
#[command(version = version::VERSION_NUMBER)]
#[command(about = "Query a RAG chat backend from the command line", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command; they override environment settings
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Backend base URL (overrides RAG_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Message language: vi or en (overrides RAG_LOCALE)
    #[arg(long, global = true)]
    pub locale: Option<Locale>,

    /// Per-attempt timeout in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that the backend is up
    Health,

    /// Answer a question with the local RAG pipeline
    Ask(ask::AskArgs),

    /// Send a message through the server-side RAG chat
    Send(ask::SendArgs),

    /// Manage chat history
    #[command(subcommand)]
    Chats(chats::ChatsCommand),
}

/// Load configuration from the environment and apply command-line overrides
pub fn load_config(global: &GlobalArgs) -> Result<ClientConfig> {
    let mut config = ClientConfig::from_env();
    if let Some(url) = &global.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(locale) = global.locale {
        config.locale = locale;
    }
    if let Some(timeout_ms) = global.timeout_ms {
        config.request_timeout_ms = timeout_ms;
    }
    config.validate()?;
    Ok(config)
}

pub(crate) fn connect(config: &ClientConfig) -> Result<Arc<BackendClient>> {
    let client = BackendClient::from_config(config)
        .map_err(|e| anyhow!(e.user_message(config.locale)))?;
    Ok(Arc::new(client))
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let config = load_config(&cli.global)?;
    match cli.command {
        Commands::Health => health(&config).await,
        Commands::Ask(args) => ask::ask(&config, args).await,
        Commands::Send(args) => ask::send(&config, args).await,
        Commands::Chats(command) => chats::execute(&config, command).await,
    }
}

async fn health(config: &ClientConfig) -> Result<()> {
    let client = connect(config)?;
    let health = client
        .health()
        .await
        .map_err(|e| anyhow!(e.user_message(config.locale)))?;

    let marker = if health.is_healthy() { "✅" } else { "⚠️" };
    println!("{} {} ({})", marker, health.status, client.base_url());
    if let Some(service) = &health.service {
        println!("   Service: {} {}", service, health.version.as_deref().unwrap_or(""));
    }
    if let (Some(docs), Some(chunks)) = (health.total_documents, health.total_chunks) {
        println!("   Documents: {}, chunks: {}", docs, chunks);
    }
    if let Some(error) = &health.error {
        println!("   Error: {}", error);
    }

    if health.is_healthy() {
        Ok(())
    } else {
        Err(anyhow!("Backend is not healthy"))
    }
}
