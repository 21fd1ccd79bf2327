use std::time::Duration;
use thiserror::Error;

/// Classification of a failed remote catalog call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// HTTP 429. `retry_after` carries the advertised delay when the remote sent one.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Transient failure: 5xx, connection error or timeout.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Anything else the remote rejected, or a body we could not decode.
    #[error("remote error {status}: {message}")]
    RemoteError { status: u16, message: String },
}

impl CatalogError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CatalogError::RemoteError { .. })
    }
}
