//! Error taxonomy surfaced by the reconciliation and aggregation engine.

use crate::catalog::EntityKind;
use crate::catalog_client::CatalogError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The remote catalog returned no entry for these ids.
    #[error("{kind} ids not found remotely: {}", .ids.join(", "))]
    NotFoundRemotely { kind: EntityKind, ids: Vec<String> },

    #[error("Rate limited by remote catalog (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Remote catalog unavailable: {0}")]
    Unavailable(String),

    #[error("Remote catalog error {status}: {message}")]
    RemoteError { status: u16, message: String },

    #[error("Cannot aggregate an empty collection")]
    EmptyInput,

    #[error("Cannot build a recommendation seed from an analysis without tracks")]
    InsufficientTracks,

    #[error("Invalid identifier format: '{0}'")]
    InvalidIdentifierFormat(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::RateLimited { .. } | EngineError::Unavailable(_)
        )
    }
}

impl From<CatalogError> for EngineError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::RateLimited { retry_after } => EngineError::RateLimited { retry_after },
            CatalogError::Unavailable(msg) => EngineError::Unavailable(msg),
            CatalogError::RemoteError { status, message } => {
                EngineError::RemoteError { status, message }
            }
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_errors_map_one_to_one() {
        let err: EngineError = CatalogError::RateLimited {
            retry_after: Some(Duration::from_secs(3)),
        }
        .into();
        assert!(matches!(
            err,
            EngineError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(3)
        ));

        let err: EngineError = CatalogError::RemoteError {
            status: 404,
            message: "non existing id".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Remote catalog error 404: non existing id");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_not_found_lists_ids() {
        let err = EngineError::NotFoundRemotely {
            kind: EntityKind::Track,
            ids: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "track ids not found remotely: a, b");
    }

    #[test]
    fn test_caller_errors_are_not_transient() {
        assert!(!EngineError::EmptyInput.is_transient());
        assert!(!EngineError::InsufficientTracks.is_transient());
        assert!(EngineError::Unavailable("timeout".to_string()).is_transient());
    }
}
