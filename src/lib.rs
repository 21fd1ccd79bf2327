//! Synai catalog engine
//!
//! Reconciles remote music catalog entities into a local store and aggregates
//! their audio features into analyses, history charts and recommendation seeds.

pub mod analysis;
pub mod catalog;
pub mod catalog_client;
pub mod config;
pub mod entity_store;
pub mod error;
pub mod recommendation;
pub mod reconciler;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use catalog_client::{CatalogClient, SpotifyClient};
pub use entity_store::{EntityStore, SqliteEntityStore};
pub use error::{EngineError, EngineResult};
pub use recommendation::{Recommender, SeedBuilder};
pub use reconciler::{Reconciler, Resolution};
