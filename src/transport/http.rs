// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP transport over reqwest
//!
//! Every call goes through the `ResilientClient`. Responses are validated
//! before they reach the caller: non-2xx statuses become
//! `RequestError::Server` carrying the `detail` message from the body, and
//! an empty 2xx body is treated as the retryable empty-response condition.

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::errors::RequestError;
use super::retry::{RequestOptions, RequestStats, ResilientClient};

/// Body of a streaming response, chunk by chunk
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, RequestError>> + Send>>;

/// JSON-over-HTTP transport with retry, timeout and cancellation
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    resilient: Arc<ResilientClient>,
}

impl HttpTransport {
    /// Create a new transport
    ///
    /// # Arguments
    /// * `base_url` - Backend base URL, e.g. `http://localhost:8000/api/v1/rag`
    /// * `options` - Retry and timeout options applied to every call
    pub fn new(base_url: &str, options: RequestOptions) -> Result<Self, RequestError> {
        Url::parse(base_url)
            .map_err(|e| RequestError::InvalidRequest(format!("Invalid URL: {}", e)))?;

        // Deadlines are enforced per attempt by the resilient client
        let client = Client::builder()
            .build()
            .map_err(|e| RequestError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            resilient: Arc::new(ResilientClient::new(options)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Attempt counters across all calls made by this transport
    pub fn stats(&self) -> RequestStats {
        self.resilient.stats()
    }

    /// Per-attempt deadline; also the idle limit between stream chunks
    pub fn timeout(&self) -> Duration {
        self.resilient.options().policy.timeout
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<T, RequestError> {
        self.send_json::<(), T>(Method::GET, path, query, None, cancel)
            .await
    }

    pub async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<T, RequestError> {
        self.send_json(Method::POST, path, &[], Some(body), cancel)
            .await
    }

    /// PUT with parameters carried in the query string
    pub async fn put_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<T, RequestError> {
        self.send_json::<(), T>(Method::PUT, path, query, None, cancel)
            .await
    }

    pub async fn delete_json<T: DeserializeOwned>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<T, RequestError> {
        self.send_json::<(), T>(Method::DELETE, path, &[], None, cancel)
            .await
    }

    async fn send_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        cancel: &CancellationToken,
    ) -> Result<T, RequestError> {
        let url = self.url(path);
        let label = format!("{} {}", method, path);
        let timeout_ms = self.timeout().as_millis() as u64;

        self.resilient
            .execute(&label, cancel, |_attempt| {
                let mut request = self
                    .client
                    .request(method.clone(), &url)
                    .header("Cache-Control", "no-cache")
                    .query(query);
                if let Some(body) = body {
                    request = request.json(body);
                }

                async move {
                    let response = request
                        .send()
                        .await
                        .map_err(|e| classify_reqwest_error(e, timeout_ms))?;
                    let response = check_status(response).await?;
                    decode_json(response, timeout_ms).await
                }
            })
            .await
    }

    /// POST and return the response body as a chunk stream
    ///
    /// Only connection setup and status validation are retried; once the
    /// body starts flowing, errors are delivered through the stream. The
    /// returned stream has no deadline of its own; readers bound the gap
    /// between chunks with `timeout()`.
    pub async fn post_stream<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<ByteStream, RequestError> {
        let url = self.url(path);
        let label = format!("POST {} (stream)", path);
        let timeout_ms = self.timeout().as_millis() as u64;

        let response = self
            .resilient
            .execute(&label, cancel, |_attempt| {
                let request = self
                    .client
                    .post(&url)
                    .header("Accept", "text/event-stream")
                    .json(body);

                async move {
                    let response = request
                        .send()
                        .await
                        .map_err(|e| classify_reqwest_error(e, timeout_ms))?;
                    check_status(response).await
                }
            })
            .await?;

        debug!("Stream opened for {}", path);
        let stream = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| classify_reqwest_error(e, timeout_ms)));
        Ok(Box::pin(stream))
    }
}

/// Map a reqwest failure onto the transport error taxonomy
///
/// `timeout_ms` is the deadline in force for the call, reported when the
/// failure is a timeout.
pub fn classify_reqwest_error(e: reqwest::Error, timeout_ms: u64) -> RequestError {
    if e.is_timeout() {
        return RequestError::Timeout { timeout_ms };
    }
    if e.is_connect() {
        return RequestError::Connection(e.to_string());
    }

    let text = e.to_string().to_lowercase();
    if (e.is_request() || e.is_body())
        && (text.contains("closed") || text.contains("reset") || text.contains("empty"))
    {
        return RequestError::EmptyResponse;
    }
    if e.is_decode() {
        return RequestError::Decode(e.to_string());
    }

    RequestError::Connection(e.to_string())
}

/// Convert non-2xx responses into `RequestError::Server`
async fn check_status(response: Response) -> Result<Response, RequestError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RequestError::Server {
        status: status.as_u16(),
        message: server_message(status.as_u16(), &body),
    })
}

/// Extract the human-readable message from an error body
///
/// The backend reports errors as `{"detail": ...}`; anything else falls back
/// to the bare status.
pub fn server_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => match value.get("detail") {
            Some(serde_json::Value::String(detail)) => detail.clone(),
            Some(detail) if !detail.is_null() => detail.to_string(),
            _ => format!("HTTP error! status: {}", status),
        },
        Err(_) => format!("HTTP error! status: {}", status),
    }
}

async fn decode_json<T: DeserializeOwned>(
    response: Response,
    timeout_ms: u64,
) -> Result<T, RequestError> {
    let body = response
        .bytes()
        .await
        .map_err(|e| classify_reqwest_error(e, timeout_ms))?;
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(RequestError::EmptyResponse);
    }
    serde_json::from_slice(&body).map_err(|e| RequestError::Decode(e.to_string()))
}
