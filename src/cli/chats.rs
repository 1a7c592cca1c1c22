// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use clap::Subcommand;

use super::connect;
use crate::api::{ChatListQuery, ChatUpdate, Page};
use crate::config::ClientConfig;

#[derive(Subcommand, Debug)]
pub enum ChatsCommand {
    /// List chats with their statistics
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 20)]
        per_page: u32,

        #[arg(long)]
        user_id: Option<i64>,

        /// Only chats filtered to this category
        #[arg(long)]
        category: Option<String>,
    },

    /// Show the messages of a chat
    Messages {
        chat_id: i64,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 50)]
        per_page: u32,
    },

    /// Change a chat's title
    Rename { chat_id: i64, title: String },

    /// Mark a chat active or inactive
    SetActive {
        chat_id: i64,
        #[arg(action = clap::ArgAction::Set)]
        active: bool,
    },

    /// Delete a chat
    Delete { chat_id: i64 },
}

pub async fn execute(config: &ClientConfig, command: ChatsCommand) -> Result<()> {
    let client = connect(config)?;
    let locale = config.locale;
    let to_anyhow = |e: crate::transport::RequestError| anyhow!(e.user_message(locale));

    match command {
        ChatsCommand::List {
            page,
            per_page,
            user_id,
            category,
        } => {
            let query = ChatListQuery {
                page: Page::new(page, per_page),
                user_id,
                category_filter: category,
            };
            let response = client.list_chats(&query).await.map_err(to_anyhow)?;

            println!(
                "💬 {} chats (page {}, {} per page)",
                response.total, response.page, response.per_page
            );
            for chat in &response.chats {
                let stats = &chat.stats;
                println!(
                    "  #{} {}{}  messages: {}/{}  sources: {}  confidence: {:.3}",
                    chat.id,
                    chat.title.as_deref().unwrap_or("(untitled)"),
                    if chat.is_active { "" } else { " [inactive]" },
                    stats.message_stats.user,
                    stats.message_stats.assistant,
                    stats.sources_used,
                    stats.avg_confidence
                );
            }
        }
        ChatsCommand::Messages {
            chat_id,
            page,
            per_page,
        } => {
            let response = client
                .chat_messages(chat_id, Page::new(page, per_page))
                .await
                .map_err(to_anyhow)?;

            println!("💬 Chat {} ({} messages)", chat_id, response.total);
            for message in &response.messages {
                println!(
                    "\n[{}] {}",
                    message.role,
                    message.created_at.as_deref().unwrap_or("")
                );
                println!("{}", message.content);
                if let Some(info) = &message.sources_info {
                    println!(
                        "  📚 {} sources, confidence {:.2}",
                        info.total_sources, info.confidence
                    );
                }
            }
        }
        ChatsCommand::Rename { chat_id, title } => {
            let update = ChatUpdate {
                title: Some(title),
                is_active: None,
            };
            let response = client.update_chat(chat_id, &update).await.map_err(to_anyhow)?;
            println!("✅ {}", response.message);
        }
        ChatsCommand::SetActive { chat_id, active } => {
            let update = ChatUpdate {
                title: None,
                is_active: Some(active),
            };
            let response = client.update_chat(chat_id, &update).await.map_err(to_anyhow)?;
            println!("✅ {}", response.message);
        }
        ChatsCommand::Delete { chat_id } => {
            let response = client.delete_chat(chat_id).await.map_err(to_anyhow)?;
            if !response.success {
                return Err(anyhow!(response.message));
            }
            println!("✅ {}", response.message);
        }
    }

    Ok(())
}
