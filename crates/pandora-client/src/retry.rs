// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded retry around a single direct send.
//!
//! HTTP 5xx, connect failures, timeouts and transport write errors are
//! retried after a fixed backoff. Everything else, HTTP 4xx included, ends
//! the send on the first attempt.

use std::time::Duration;
use thiserror::Error;

use crate::error::{Error, Result};
use crate::transport::TransportError;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default pause between attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

/// Retry budget of a direct send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Fixed pause before each retry.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Total attempts before giving up.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_BACKOFF)
    }
}

/// Cause of a retryable failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendFailure {
    #[error("server error HTTP {0}")]
    Status(u16),
    #[error(transparent)]
    Transport(TransportError),
}

/// Classified outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// 2xx response.
    Delivered,
    /// Non-2xx response that is not retried.
    Rejected(u16),
    /// Worth another attempt.
    Retry(SendFailure),
    /// Transport failure that is not retried.
    Fatal(TransportError),
}

/// Map a transport result to an [`Attempt`].
pub fn classify(result: std::result::Result<u16, TransportError>) -> Attempt {
    match result {
        Ok(code) if (200..300).contains(&code) => Attempt::Delivered,
        Ok(code) if code >= 500 => Attempt::Retry(SendFailure::Status(code)),
        Ok(code) => Attempt::Rejected(code),
        Err(e) if e.is_retryable() => Attempt::Retry(SendFailure::Transport(e)),
        Err(e) => Attempt::Fatal(e),
    }
}

/// Run `attempt` until it is delivered, fails terminally, or the budget of
/// `policy.max_retries + 1` attempts is spent.
///
/// `attempt` receives the 1-based attempt number and must build a freshly
/// signed request each time.
pub fn send_with_retry<F>(policy: &RetryPolicy, mut attempt: F) -> Result<()>
where
    F: FnMut(u32) -> std::result::Result<u16, TransportError>,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match classify(attempt(attempts)) {
            Attempt::Delivered => {
                if attempts > 1 {
                    tracing::info!(attempts, "write succeeded after retry");
                }
                return Ok(());
            }
            Attempt::Rejected(code) => {
                tracing::warn!(status = code, "write rejected");
                return Err(Error::Status(code));
            }
            Attempt::Fatal(e) => {
                tracing::error!(error = %e, "write failed");
                return Err(Error::Transport(e));
            }
            Attempt::Retry(cause) => {
                if attempts >= policy.max_attempts() {
                    tracing::error!(
                        attempts,
                        error = %cause,
                        "write failed, retry budget exhausted"
                    );
                    return Err(Error::WriteFailed { attempts, cause });
                }
                tracing::warn!(
                    attempt = attempts,
                    backoff_ms = policy.backoff.as_millis() as u64,
                    error = %cause,
                    "write failed, retrying"
                );
                if !policy.backoff.is_zero() {
                    std::thread::sleep(policy.backoff);
                }
            }
        }
    }
}
