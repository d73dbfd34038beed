//! Retry policy for catalog calls.
//!
//! Implements bounded exponential backoff. Retry is an adapter concern:
//! the pipeline never re-issues catalog calls itself.

use super::CatalogError;
use std::time::Duration;

/// Retry policy implementing exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries before giving up.
    pub max_retries: u32,
    /// Initial backoff duration in milliseconds.
    pub initial_backoff_ms: u64,
    /// Cap for exponential growth, in milliseconds.
    pub max_backoff_ms: u64,
    /// Multiplier applied to backoff after each retry.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Check if an error should be retried given the current retry count.
    pub fn should_retry(&self, error: &CatalogError, retry_count: u32) -> bool {
        error.is_retryable() && retry_count < self.max_retries
    }

    /// Backoff before the given retry, honoring a server-provided
    /// `Retry-After` hint when the error carries one.
    pub fn backoff(&self, error: &CatalogError, retry_count: u32) -> Duration {
        if let CatalogError::RateLimited {
            retry_after_secs: Some(secs),
        } = error
        {
            return Duration::from_secs(*secs);
        }
        Duration::from_millis(self.backoff_ms(retry_count))
    }

    /// `initial_backoff * multiplier^retry_count`, capped at `max_backoff_ms`.
    pub fn backoff_ms(&self, retry_count: u32) -> u64 {
        let backoff =
            self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(retry_count as i32);
        backoff.min(self.max_backoff_ms as f64) as u64
    }
}
