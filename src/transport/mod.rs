// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Resilient request layer
//!
//! Every network call made by the client goes through here:
//! - Per-attempt deadline with abort on expiry
//! - Cancellation through `CancellationToken`
//! - Bounded retry with a fixed delay for transport-level failures
//! - Status validation and server error decoding

pub mod errors;
pub mod http;
pub mod retry;

pub use errors::RequestError;
pub use http::{ByteStream, HttpTransport};
pub use retry::{
    RequestAttempt, RequestOptions, RequestStats, ResilientClient, RetryPolicy, RetryPredicate,
};
