//! CatalogClient trait definition.
//!
//! Abstracts the remote catalog so the reconciler can be driven by the real
//! HTTP client or by an in-process fake.

use super::error::CatalogError;
use super::models::{CatalogPayload, SearchHits};
use crate::catalog::{EntityKind, SearchType};
use crate::recommendation::ToleranceWindow;
use async_trait::async_trait;

#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Look up `ids` of one kind in a single remote call.
    ///
    /// The returned vector is positionally aligned with `ids`; `None` marks an id
    /// the remote does not know. Callers never pass more than
    /// [`EntityKind::api_batch_ceiling`] ids.
    async fn fetch_batch(
        &self,
        kind: EntityKind,
        ids: &[String],
    ) -> Result<Vec<Option<CatalogPayload>>, CatalogError>;

    /// Free-text search over the requested types.
    async fn search(
        &self,
        query: &str,
        types: &[SearchType],
        limit: usize,
    ) -> Result<SearchHits, CatalogError>;

    /// Track ids recommended from a seed sample and a feature window.
    async fn recommend(
        &self,
        seed_track_ids: &[String],
        window: &ToleranceWindow,
        limit: usize,
    ) -> Result<Vec<String>, CatalogError>;
}
