//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{track_id, TestEngine};
//!
//! #[tokio::test]
//! async fn test_resolve_track() {
//!     let engine = TestEngine::with_catalog(common::sample_catalog());
//!     let resolution = engine.reconciler.resolve_tracks([track_id(1)]).await.unwrap();
//!     assert_eq!(resolution.entities.len(), 1);
//! }
//! ```

mod constants;
mod fake_client;
mod fixtures;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use fake_client::{FakeCatalogClient, RecordedCall};
#[allow(unused_imports)]
pub use fixtures::{features, sample_catalog, zero_backoff_settings, TestEngine};
