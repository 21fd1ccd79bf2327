//! Retry policy for remote batch calls.
//!
//! Implements exponential backoff with configurable parameters. A
//! `Retry-After` advertised by the remote takes precedence over the computed
//! backoff, still capped at `max_backoff_ms`.

use crate::catalog_client::CatalogError;
use crate::config::ReconcilerSettings;
use std::time::Duration;

/// Retry policy implementing exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Initial backoff duration in milliseconds.
    pub initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds (cap for exponential growth).
    pub max_backoff_ms: u64,
    /// Multiplier applied to backoff after each retry.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Create a new RetryPolicy from configuration settings.
    pub fn new(config: &ReconcilerSettings) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
            backoff_multiplier: config.backoff_multiplier,
        }
    }

    /// Check if an error should be retried given the current retry count.
    ///
    /// Returns true if:
    /// - The error is transient (rate limited or unavailable)
    /// - The retry count is less than max_retries
    pub fn should_retry(&self, error: &CatalogError, retry_count: u32) -> bool {
        error.is_retryable() && retry_count < self.max_retries
    }

    /// Backoff in milliseconds: `initial_backoff * multiplier^retry_count`,
    /// capped at `max_backoff_ms`.
    pub fn backoff_ms(&self, retry_count: u32) -> u64 {
        let backoff =
            self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(retry_count as i32);
        backoff.min(self.max_backoff_ms as f64) as u64
    }

    /// How long to wait before retry number `retry_count + 1` after `error`.
    pub fn delay_for(&self, error: &CatalogError, retry_count: u32) -> Duration {
        let cap = Duration::from_millis(self.max_backoff_ms);
        match error {
            CatalogError::RateLimited {
                retry_after: Some(retry_after),
            } => (*retry_after).min(cap),
            _ => Duration::from_millis(self.backoff_ms(retry_count)),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&ReconcilerSettings::default())
    }
}
