// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::api::GenerationRequest;
use crate::stream::EventStream;
use crate::transport::RequestError;

/// Text generation boundary used by the pipeline
#[async_trait]
pub trait Generator: Send + Sync {
    /// Blocking generation; returns the whole answer at once
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, RequestError>;

    /// Open a token stream for the answer
    async fn generate_stream(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<EventStream, RequestError>;
}
