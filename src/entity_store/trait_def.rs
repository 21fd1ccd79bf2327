//! EntityStore trait definition.

use crate::catalog::{Album, Analysis, Artist, NewAnalysis, NewNamedEntity, NewTrack, Track};
use anyhow::Result;

/// Row counts, used for startup logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub artists: usize,
    pub albums: usize,
    pub tracks: usize,
    pub analyses: usize,
}

/// Local persistence for catalog entities and analyses.
///
/// Lookups take remote (external) ids and return whatever subset exists, in
/// no particular order. Inserts are insert-if-absent: an external id that is
/// already stored is left untouched and its existing record is returned, so
/// concurrent writers of the same id converge on one row.
pub trait EntityStore: Send + Sync {
    // =========================================================================
    // Lookup by external id
    // =========================================================================

    fn find_artists(&self, ids: &[String]) -> Result<Vec<Artist>>;

    fn find_albums(&self, ids: &[String]) -> Result<Vec<Album>>;

    /// Tracks come back fully hydrated: features, album and artists attached.
    fn find_tracks(&self, ids: &[String]) -> Result<Vec<Track>>;

    // =========================================================================
    // Insert-if-absent
    // =========================================================================

    fn insert_artists(&self, records: &[NewNamedEntity]) -> Result<Vec<Artist>>;

    fn insert_albums(&self, records: &[NewNamedEntity]) -> Result<Vec<Album>>;

    /// Write tracks with their feature vectors and artist links atomically.
    ///
    /// All referenced artists and albums must already be stored.
    fn insert_tracks(&self, records: &[NewTrack]) -> Result<Vec<Track>>;

    // =========================================================================
    // Analyses
    // =========================================================================

    fn create_analysis(&self, analysis: &NewAnalysis) -> Result<Analysis>;

    fn get_analysis(&self, local_id: i64) -> Result<Option<Analysis>>;

    /// All analyses of a user, ascending by creation time.
    fn list_analyses(&self, user_id: &str) -> Result<Vec<Analysis>>;

    fn latest_analysis(&self, user_id: &str) -> Result<Option<Analysis>>;

    fn counts(&self) -> Result<StoreCounts>;
}
