//! Catalog entities as held in the local store.

use super::features::AudioFeatures;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of remote catalog entity the engine knows how to fetch.
///
/// Each variant maps to its remote endpoint, response key and per-call ceiling
/// through plain `match`es, so adding a kind is checked by the compiler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Artist,
    Album,
    Track,
    AudioFeatures,
}

impl EntityKind {
    /// Path segment of the batch lookup endpoint.
    pub fn endpoint(&self) -> &'static str {
        match self {
            EntityKind::Artist => "artists",
            EntityKind::Album => "albums",
            EntityKind::Track => "tracks",
            EntityKind::AudioFeatures => "audio-features",
        }
    }

    /// Key of the array in the batch lookup response body.
    pub fn response_key(&self) -> &'static str {
        match self {
            EntityKind::Artist => "artists",
            EntityKind::Album => "albums",
            EntityKind::Track => "tracks",
            EntityKind::AudioFeatures => "audio_features",
        }
    }

    /// Maximum number of ids the remote API accepts in one batch call.
    pub fn api_batch_ceiling(&self) -> usize {
        match self {
            EntityKind::Artist => 50,
            EntityKind::Album => 20,
            EntityKind::Track => 50,
            EntityKind::AudioFeatures => 100,
        }
    }

    /// Effective chunk size: the configured size, never above the API ceiling.
    pub fn batch_size(&self, configured: usize) -> usize {
        configured.clamp(1, self.api_batch_ceiling())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Artist => "artist",
            EntityKind::Album => "album",
            EntityKind::Track => "track",
            EntityKind::AudioFeatures => "audio_features",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "artist" => Some(EntityKind::Artist),
            "album" => Some(EntityKind::Album),
            "track" => Some(EntityKind::Track),
            "audio_features" => Some(EntityKind::AudioFeatures),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity types that can be searched for on the remote catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Track,
    Artist,
    Album,
}

impl SearchType {
    pub const ALL: [SearchType; 3] = [SearchType::Track, SearchType::Artist, SearchType::Album];

    /// Value of the remote `type` query parameter.
    pub fn query_value(&self) -> &'static str {
        match self {
            SearchType::Track => "track",
            SearchType::Artist => "artist",
            SearchType::Album => "album",
        }
    }

    /// Key of the paging object in the search response body.
    pub fn response_key(&self) -> &'static str {
        match self {
            SearchType::Track => "tracks",
            SearchType::Artist => "artists",
            SearchType::Album => "albums",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "track" => Some(SearchType::Track),
            "artist" => Some(SearchType::Artist),
            "album" => Some(SearchType::Album),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub local_id: i64,
    pub external_id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub local_id: i64,
    pub external_id: String,
    pub name: String,
}

/// A fully resolved track.
///
/// There is no representation of a half-built track: features and at least one
/// artist are attached before the store ever writes the row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub local_id: i64,
    pub external_id: String,
    pub name: String,
    pub features: AudioFeatures,
    pub album: Option<Album>,
    pub artists: Vec<Artist>,
}

/// Lightweight reference to a stored track.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRef {
    pub local_id: i64,
    pub external_id: String,
    pub name: String,
}

/// A track ready to be written: everything it references already exists in the store.
#[derive(Clone, Debug)]
pub struct NewTrack {
    pub external_id: String,
    pub name: String,
    pub features: AudioFeatures,
    pub album_local_id: Option<i64>,
    pub artist_local_ids: Vec<i64>,
}

/// Artist or album data coming from the remote catalog, not yet stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewNamedEntity {
    pub external_id: String,
    pub name: String,
}

/// An immutable history record of one aggregation over a set of tracks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub local_id: i64,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub tracks: Vec<TrackRef>,
    pub songs_len: usize,
    pub summary: AudioFeatures,
}

/// Input for [`crate::entity_store::EntityStore::create_analysis`].
#[derive(Clone, Debug)]
pub struct NewAnalysis {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub track_local_ids: Vec<i64>,
    pub summary: AudioFeatures,
}
