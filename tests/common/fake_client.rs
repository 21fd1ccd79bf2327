//! In-memory `CatalogClient` that records every call.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use synai_catalog::catalog::{AudioFeatures, EntityKind, SearchType};
use synai_catalog::catalog_client::{
    AlbumPayload, ArtistPayload, AudioFeaturesPayload, CatalogClient, CatalogError,
    CatalogPayload, SearchHits, SimplifiedEntity, TrackPayload,
};
use synai_catalog::recommendation::ToleranceWindow;

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Batch { kind: EntityKind, ids: Vec<String> },
    Search { query: String },
    Recommend { seeds: Vec<String>, window: ToleranceWindow, limit: usize },
}

#[derive(Default)]
pub struct FakeCatalogClient {
    artists: HashMap<String, String>,
    albums: HashMap<String, String>,
    tracks: HashMap<String, TrackPayload>,
    features: HashMap<String, AudioFeatures>,
    search_hits: SearchHits,
    recommendations: Vec<String>,
    calls: Mutex<Vec<RecordedCall>>,
    /// Errors returned, in order, by the next calls.
    queued_failures: Mutex<VecDeque<CatalogError>>,
    /// Returned by every call once the queue is drained.
    permanent_failure: Mutex<Option<CatalogError>>,
    /// Returned by every batch call of one kind, after the call is recorded.
    kind_failure: Mutex<Option<(EntityKind, CatalogError)>>,
    /// Slept by every call before it answers.
    delay: Option<Duration>,
}

impl FakeCatalogClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artist(mut self, id: &str, name: &str) -> Self {
        self.artists.insert(id.to_string(), name.to_string());
        self
    }

    pub fn with_album(mut self, id: &str, name: &str) -> Self {
        self.albums.insert(id.to_string(), name.to_string());
        self
    }

    /// Add a track. `features: None` makes its audio features missing remotely.
    pub fn with_track(
        mut self,
        id: &str,
        name: &str,
        artist_ids: &[String],
        album_id: Option<&str>,
        features: Option<AudioFeatures>,
    ) -> Self {
        self.tracks.insert(
            id.to_string(),
            TrackPayload {
                id: id.to_string(),
                name: name.to_string(),
                artists: artist_ids
                    .iter()
                    .map(|a| SimplifiedEntity {
                        id: Some(a.clone()),
                        name: format!("Artist {}", a),
                    })
                    .collect(),
                album: album_id.map(|a| SimplifiedEntity {
                    id: Some(a.to_string()),
                    name: format!("Album {}", a),
                }),
            },
        );
        if let Some(features) = features {
            self.features.insert(id.to_string(), features);
        }
        self
    }

    pub fn with_search_hits(mut self, hits: SearchHits) -> Self {
        self.search_hits = hits;
        self
    }

    pub fn with_recommendations(mut self, track_ids: Vec<String>) -> Self {
        self.recommendations = track_ids;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_kind(&self, kind: EntityKind, error: CatalogError) {
        *self.kind_failure.lock().unwrap() = Some((kind, error));
    }

    pub fn fail_next(&self, error: CatalogError) {
        self.queued_failures.lock().unwrap().push_back(error);
    }

    pub fn fail_always(&self, error: CatalogError) {
        *self.permanent_failure.lock().unwrap() = Some(error);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Ids of every batch call for `kind`, one entry per call.
    pub fn batches(&self, kind: EntityKind) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::Batch { kind: k, ids } if k == kind => Some(ids),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: RecordedCall) -> Result<(), CatalogError> {
        self.calls.lock().unwrap().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        // Let concurrent passes interleave at every remote call.
        tokio::task::yield_now().await;
        if let Some(error) = self.queued_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        if let Some(error) = self.permanent_failure.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(())
    }

    fn lookup(&self, kind: EntityKind, id: &str) -> Option<CatalogPayload> {
        match kind {
            EntityKind::Artist => self.artists.get(id).map(|name| {
                CatalogPayload::Artist(ArtistPayload {
                    id: id.to_string(),
                    name: name.clone(),
                })
            }),
            EntityKind::Album => self.albums.get(id).map(|name| {
                CatalogPayload::Album(AlbumPayload {
                    id: id.to_string(),
                    name: name.clone(),
                })
            }),
            EntityKind::Track => self.tracks.get(id).cloned().map(CatalogPayload::Track),
            EntityKind::AudioFeatures => self.features.get(id).map(|features| {
                CatalogPayload::AudioFeatures(AudioFeaturesPayload {
                    id: id.to_string(),
                    features: *features,
                })
            }),
        }
    }
}

#[async_trait]
impl CatalogClient for FakeCatalogClient {
    async fn fetch_batch(
        &self,
        kind: EntityKind,
        ids: &[String],
    ) -> Result<Vec<Option<CatalogPayload>>, CatalogError> {
        self.record(RecordedCall::Batch {
            kind,
            ids: ids.to_vec(),
        })
        .await?;
        let kind_failure = self.kind_failure.lock().unwrap().clone();
        if let Some((failing, error)) = kind_failure {
            if failing == kind {
                return Err(error);
            }
        }
        Ok(ids.iter().map(|id| self.lookup(kind, id)).collect())
    }

    async fn search(
        &self,
        query: &str,
        types: &[SearchType],
        limit: usize,
    ) -> Result<SearchHits, CatalogError> {
        self.record(RecordedCall::Search {
            query: query.to_string(),
        })
        .await?;
        let take = |ids: &Vec<String>, search_type: SearchType| -> Vec<String> {
            if types.contains(&search_type) {
                ids.iter().take(limit).cloned().collect()
            } else {
                Vec::new()
            }
        };
        Ok(SearchHits {
            tracks: take(&self.search_hits.tracks, SearchType::Track),
            artists: take(&self.search_hits.artists, SearchType::Artist),
            albums: take(&self.search_hits.albums, SearchType::Album),
        })
    }

    async fn recommend(
        &self,
        seed_track_ids: &[String],
        window: &ToleranceWindow,
        limit: usize,
    ) -> Result<Vec<String>, CatalogError> {
        self.record(RecordedCall::Recommend {
            seeds: seed_track_ids.to_vec(),
            window: *window,
            limit,
        })
        .await?;
        Ok(self.recommendations.iter().take(limit).cloned().collect())
    }
}
