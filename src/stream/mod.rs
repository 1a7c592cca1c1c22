// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Generation stream decoding
//!
//! The server streams lines of the form `data: {"type": ..., ...}`.
//! `StreamDecoder` reassembles them from arbitrary chunks, the reader task
//! turns a response body into an ordered `EventStream`, and
//! `collect_tokens` drives that stream into a text buffer.

pub mod decoder;
pub mod events;
pub mod reader;

pub use decoder::{parse_event, StreamDecoder};
pub use events::{StreamEvent, StreamParseError};
pub use reader::{collect_tokens, spawn_event_reader, EventStream, StreamError, StreamSummary};
