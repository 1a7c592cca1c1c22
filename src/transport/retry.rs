// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Resilient request execution
//!
//! Wraps a single logical network call with:
//! - A hard per-attempt deadline
//! - Cooperative cancellation via `CancellationToken`
//! - Bounded retries with a fixed inter-attempt delay
//!
//! The delay is fixed rather than exponential: the dominant failure is a
//! backend that is still starting up, not a congested one.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::errors::RequestError;

/// Decides whether a failed attempt should be retried
pub type RetryPredicate = fn(&RequestError) -> bool;

/// Retry and timeout settings for one logical request
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub retry_delay: Duration,
    /// Deadline applied to each attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Options for the resilient client
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub policy: RetryPolicy,
    pub is_retryable: RetryPredicate,
}

impl RequestOptions {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            is_retryable: RequestError::is_retryable,
        }
    }

    /// Replace the retry predicate
    pub fn with_predicate(mut self, is_retryable: RetryPredicate) -> Self {
        self.is_retryable = is_retryable;
        self
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

/// State of a single attempt, handed to the operation being retried
#[derive(Debug, Clone)]
pub struct RequestAttempt {
    /// 1-based attempt ordinal
    pub attempt_number: u32,
    /// Instant at which this attempt is aborted
    pub deadline: Instant,
    /// No retry follows this attempt, whatever its outcome
    pub is_last: bool,
}

/// Attempt counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestStats {
    /// Logical calls made through `execute`
    pub calls: u64,
    /// Individual attempts, retries included
    pub attempts: u64,
    /// Attempts that were a retry of an earlier failure
    pub retries: u64,
    /// Logical calls that ended in an error
    pub failures: u64,
}

/// Executes network operations with deadline, cancellation and retry
#[derive(Debug)]
pub struct ResilientClient {
    options: RequestOptions,
    calls: AtomicU64,
    attempts: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
}

impl ResilientClient {
    pub fn new(options: RequestOptions) -> Self {
        Self {
            options,
            calls: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent
    ///
    /// # Arguments
    /// * `label` - Name of the call for logging
    /// * `cancel` - Token that aborts the in-flight attempt and any pending retry
    /// * `op` - Builds and runs one attempt
    ///
    /// # Returns
    /// The first successful result, or the last error once retries are exhausted
    pub async fn execute<T, F, Fut>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, RequestError>
    where
        F: FnMut(RequestAttempt) -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let policy = &self.options.policy;
        let max_attempts = policy.max_attempts.max(1);
        self.calls.fetch_add(1, Ordering::Relaxed);

        let mut attempt_number = 0;
        loop {
            attempt_number += 1;

            if cancel.is_cancelled() {
                debug!(label, attempt = attempt_number, "Request cancelled before attempt");
                self.failures.fetch_add(1, Ordering::Relaxed);
                return Err(RequestError::Cancelled);
            }

            let attempt = RequestAttempt {
                attempt_number,
                deadline: Instant::now() + policy.timeout,
                is_last: attempt_number >= max_attempts,
            };

            self.attempts.fetch_add(1, Ordering::Relaxed);
            if attempt_number > 1 {
                self.retries.fetch_add(1, Ordering::Relaxed);
            }
            info!(
                label,
                attempt = attempt_number,
                max_attempts,
                "Making request (attempt {}/{})",
                attempt_number,
                max_attempts
            );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(RequestError::Cancelled),
                outcome = timeout(policy.timeout, op(attempt)) => match outcome {
                    Ok(result) => result,
                    Err(_) => Err(RequestError::Timeout {
                        timeout_ms: policy.timeout.as_millis() as u64,
                    }),
                },
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let retryable =
                error != RequestError::Cancelled && (self.options.is_retryable)(&error);
            let remaining = max_attempts - attempt_number;

            warn!(
                label,
                attempt = attempt_number,
                error = %error,
                retryable,
                remaining,
                "Request attempt failed"
            );

            if !retryable || remaining == 0 {
                self.failures.fetch_add(1, Ordering::Relaxed);
                return Err(error);
            }

            info!(
                label,
                "Retrying in {}ms ({} attempts left)",
                policy.retry_delay.as_millis(),
                remaining
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    return Err(RequestError::Cancelled);
                }
                _ = sleep(policy.retry_delay) => {}
            }
        }
    }

    /// Get attempt counters
    pub fn stats(&self) -> RequestStats {
        RequestStats {
            calls: self.calls.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for ResilientClient {
    fn default() -> Self {
        Self::new(RequestOptions::default())
    }
}
