// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Read loop turning a response body into an ordered event channel
//!
//! The loop runs on its own task and writes into a bounded channel, so a
//! slow consumer applies backpressure to the transport. Cancellation is
//! observed before every read and before every send; once the token fires
//! nothing more is emitted, even if decoded events are still buffered.
//! Each read is bounded by an idle deadline, so a backend that stops sending
//! without closing the connection ends the stream with a timeout.

use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::decoder::StreamDecoder;
use super::events::StreamEvent;
use crate::config::Locale;
use crate::transport::{ByteStream, RequestError};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Ordered stream of decoded events from one generation call
pub struct EventStream {
    receiver: mpsc::Receiver<Result<StreamEvent, RequestError>>,
}

impl EventStream {
    pub fn new(receiver: mpsc::Receiver<Result<StreamEvent, RequestError>>) -> Self {
        Self { receiver }
    }
}

impl Stream for EventStream {
    type Item = Result<StreamEvent, RequestError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Spawn the read loop for `body`
///
/// In-band `end` events are absorbed; exactly one `End` is emitted when the
/// transport reaches EOF. An in-band `error` is forwarded and ends the loop.
/// If no chunk arrives within `idle_timeout`, `RequestError::Timeout` is
/// forwarded and the loop ends.
pub fn spawn_event_reader(
    body: ByteStream,
    cancel: CancellationToken,
    idle_timeout: Duration,
) -> EventStream {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        let mut reader = EventReader {
            tx,
            cancel,
            idle_timeout,
            decoder: StreamDecoder::new(),
            server_length: None,
            token_chars: 0,
        };
        reader.run(body).await;
    });
    EventStream::new(rx)
}

struct EventReader {
    tx: mpsc::Sender<Result<StreamEvent, RequestError>>,
    cancel: CancellationToken,
    idle_timeout: Duration,
    decoder: StreamDecoder,
    server_length: Option<usize>,
    token_chars: usize,
}

impl EventReader {
    async fn run(&mut self, mut body: ByteStream) {
        loop {
            if self.cancel.is_cancelled() {
                debug!("Stream cancelled before next read");
                return;
            }

            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Stream cancelled during read");
                    return;
                }
                chunk = tokio::time::timeout(self.idle_timeout, body.next()) => chunk,
            };

            let next = match next {
                Ok(next) => next,
                Err(_) => {
                    let timeout_ms = self.idle_timeout.as_millis() as u64;
                    warn!(timeout_ms, tokens = self.token_chars, "Stream stalled");
                    self.send(Err(RequestError::Timeout { timeout_ms })).await;
                    return;
                }
            };

            match next {
                Some(Ok(bytes)) => {
                    for event in self.decoder.feed(&bytes) {
                        if !self.forward(event).await {
                            return;
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!("Stream transport error: {}", e);
                    self.send(Err(e)).await;
                    return;
                }
                None => {
                    for event in self.decoder.finish() {
                        if !self.forward(event).await {
                            return;
                        }
                    }
                    let total_length = self.server_length.unwrap_or(self.token_chars);
                    info!(
                        total_length,
                        skipped = self.decoder.skipped_lines(),
                        "Stream completed"
                    );
                    self.send(Ok(StreamEvent::End { total_length })).await;
                    return;
                }
            }
        }
    }

    /// Handle one decoded event; returns false when the loop must stop
    async fn forward(&mut self, event: StreamEvent) -> bool {
        match event {
            StreamEvent::End { total_length } => {
                self.server_length = Some(total_length);
                true
            }
            StreamEvent::Error { message } => {
                warn!("Stream reported error: {}", message);
                self.send(Ok(StreamEvent::Error { message })).await;
                false
            }
            StreamEvent::Token { content } => {
                self.token_chars += content.chars().count();
                self.send(Ok(StreamEvent::Token { content })).await
            }
            start @ StreamEvent::Start { .. } => self.send(Ok(start)).await,
        }
    }

    async fn send(&self, item: Result<StreamEvent, RequestError>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(item) => sent.is_ok(),
        }
    }
}

/// Outcome of a fully consumed stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSummary {
    pub text: String,
    pub token_count: usize,
    pub total_length: usize,
    pub start_message: Option<String>,
}

/// Ways a generation stream can fail to complete
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// Server sent an in-band `error` event
    #[error("Stream error: {0}")]
    Terminal(String),

    #[error("Stream transport failed: {0}")]
    Transport(RequestError),

    #[error("Stream cancelled")]
    Cancelled,

    /// Channel closed without an `end` event
    #[error("Stream ended without completion")]
    Incomplete,
}

impl From<RequestError> for StreamError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::Cancelled => StreamError::Cancelled,
            other => StreamError::Transport(other),
        }
    }
}

impl StreamError {
    pub fn error_code(&self) -> &'static str {
        match self {
            StreamError::Terminal(_) => "STREAM_TERMINAL_ERROR",
            StreamError::Transport(_) => "STREAM_TRANSPORT_ERROR",
            StreamError::Cancelled => "STREAM_CANCELLED",
            StreamError::Incomplete => "STREAM_INCOMPLETE",
        }
    }

    pub fn user_message(&self, locale: Locale) -> String {
        match (self, locale) {
            (StreamError::Terminal(message), _) => message.clone(),
            (StreamError::Transport(inner), _) => inner.user_message(locale),
            (StreamError::Cancelled, Locale::Vietnamese) => "Đã hủy yêu cầu.".to_string(),
            (StreamError::Cancelled, Locale::English) => "Request cancelled.".to_string(),
            (StreamError::Incomplete, Locale::Vietnamese) => {
                "Kết nối bị gián đoạn trước khi hoàn tất câu trả lời.".to_string()
            }
            (StreamError::Incomplete, Locale::English) => {
                "The connection closed before the answer was complete.".to_string()
            }
        }
    }
}

/// Consume `events` in order, appending tokens to the text buffer
///
/// `on_token` sees each token as it arrives. Cancellation is re-checked
/// before every token, so nothing is delivered once the token fires.
pub async fn collect_tokens<F>(
    mut events: EventStream,
    cancel: &CancellationToken,
    mut on_token: F,
) -> Result<StreamSummary, StreamError>
where
    F: FnMut(&str),
{
    let mut summary = StreamSummary::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StreamError::Cancelled),
            event = events.next() => event,
        };

        match next {
            None => {
                if cancel.is_cancelled() {
                    return Err(StreamError::Cancelled);
                }
                return Err(StreamError::Incomplete);
            }
            Some(Err(e)) => return Err(e.into()),
            Some(Ok(StreamEvent::Start { message })) => {
                debug!("Stream started: {}", message);
                summary.start_message = Some(message);
            }
            Some(Ok(StreamEvent::Token { content })) => {
                if cancel.is_cancelled() {
                    return Err(StreamError::Cancelled);
                }
                summary.token_count += 1;
                summary.text.push_str(&content);
                on_token(&content);
            }
            Some(Ok(StreamEvent::End { total_length })) => {
                summary.total_length = total_length;
                return Ok(summary);
            }
            Some(Ok(StreamEvent::Error { message })) => {
                return Err(StreamError::Terminal(message));
            }
        }
    }
}
