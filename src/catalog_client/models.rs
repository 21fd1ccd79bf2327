//! Remote catalog payloads.
//!
//! These mirror the JSON returned by the remote catalog's batch endpoints and are
//! only ever consumed by the reconciler, which turns them into stored entities.

use crate::catalog::{AudioFeatures, EntityKind};
use serde::Deserialize;

/// An artist or album reference embedded in another object.
///
/// Local files in user playlists come back with a null id, hence the `Option`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SimplifiedEntity {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ArtistPayload {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AlbumPayload {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TrackPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SimplifiedEntity>,
    pub album: Option<SimplifiedEntity>,
}

impl TrackPayload {
    pub fn artist_ids(&self) -> impl Iterator<Item = &str> {
        self.artists.iter().filter_map(|a| a.id.as_deref())
    }

    pub fn album_id(&self) -> Option<&str> {
        self.album.as_ref().and_then(|a| a.id.as_deref())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AudioFeaturesPayload {
    pub id: String,
    #[serde(flatten)]
    pub features: AudioFeatures,
}

/// One entry of a batch lookup response.
#[derive(Clone, Debug, PartialEq)]
pub enum CatalogPayload {
    Artist(ArtistPayload),
    Album(AlbumPayload),
    Track(TrackPayload),
    AudioFeatures(AudioFeaturesPayload),
}

impl CatalogPayload {
    pub fn kind(&self) -> EntityKind {
        match self {
            CatalogPayload::Artist(_) => EntityKind::Artist,
            CatalogPayload::Album(_) => EntityKind::Album,
            CatalogPayload::Track(_) => EntityKind::Track,
            CatalogPayload::AudioFeatures(_) => EntityKind::AudioFeatures,
        }
    }

    pub fn external_id(&self) -> &str {
        match self {
            CatalogPayload::Artist(p) => &p.id,
            CatalogPayload::Album(p) => &p.id,
            CatalogPayload::Track(p) => &p.id,
            CatalogPayload::AudioFeatures(p) => &p.id,
        }
    }

    /// Decode one non-null element of a batch response for `kind`.
    pub fn from_json(kind: EntityKind, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            EntityKind::Artist => CatalogPayload::Artist(serde_json::from_value(value)?),
            EntityKind::Album => CatalogPayload::Album(serde_json::from_value(value)?),
            EntityKind::Track => CatalogPayload::Track(serde_json::from_value(value)?),
            EntityKind::AudioFeatures => {
                CatalogPayload::AudioFeatures(serde_json::from_value(value)?)
            }
        })
    }
}

/// Ids returned by a remote search, grouped by type, in relevance order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchHits {
    pub tracks: Vec<String>,
    pub artists: Vec<String>,
    pub albums: Vec<String>,
}
