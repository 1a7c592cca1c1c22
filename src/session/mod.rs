// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod coordinator;
pub mod store;

pub use coordinator::{ChatSession, SessionReply};
pub use store::{
    ChatStore, InMemoryChatStore, MessageRole, NewMessage, PersistedMessage, SessionError,
    StoredMessage,
};
