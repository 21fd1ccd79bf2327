//! Local/remote catalog reconciliation.
//!
//! A resolve pass looks ids up in the entity store, fetches the complement from
//! the remote catalog in batches, persists what came back and returns the union
//! in caller order. Tracks pull their artists, album and audio features along.

use super::retry_policy::RetryPolicy;
use crate::catalog::{
    normalize_external_ids, Album, Artist, EntityKind, NewNamedEntity, NewTrack, SearchType,
    Track,
};
use crate::catalog_client::{
    AlbumPayload, ArtistPayload, CatalogClient, CatalogError, CatalogPayload, TrackPayload,
};
use crate::config::ReconcilerSettings;
use crate::entity_store::EntityStore;
use crate::error::{EngineError, EngineResult};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outcome of one resolve pass.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution<T> {
    pub kind: EntityKind,
    /// Resolved entities, in caller id order.
    pub entities: Vec<T>,
    /// Ids the remote catalog has no entry for.
    pub not_found: Vec<String>,
    /// Remote calls issued by this pass, nested passes and retries included.
    pub remote_calls: usize,
}

impl<T> Resolution<T> {
    fn empty(kind: EntityKind) -> Self {
        Self {
            kind,
            entities: Vec::new(),
            not_found: Vec::new(),
            remote_calls: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.not_found.is_empty()
    }

    /// Entities, or `NotFoundRemotely` if any requested id is missing.
    pub fn require_all(self) -> EngineResult<Vec<T>> {
        if self.not_found.is_empty() {
            Ok(self.entities)
        } else {
            Err(EngineError::NotFoundRemotely {
                kind: self.kind,
                ids: self.not_found,
            })
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub tracks: Vec<Track>,
    pub artists: Vec<Artist>,
    pub albums: Vec<Album>,
}

/// Anything addressable by its remote id.
trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Artist {
    fn key(&self) -> &str {
        &self.external_id
    }
}

impl Keyed for Album {
    fn key(&self) -> &str {
        &self.external_id
    }
}

impl Keyed for Track {
    fn key(&self) -> &str {
        &self.external_id
    }
}

/// Put `found` in the order of `ids`.
fn in_caller_order<T: Keyed>(ids: &[String], found: Vec<T>) -> Vec<T> {
    let mut by_id: HashMap<String, T> = found
        .into_iter()
        .map(|entity| (entity.key().to_string(), entity))
        .collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

/// Order-preserving dedup of ids coming from remote payloads.
fn distinct_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| !id.trim().is_empty() && seen.insert(*id))
        .map(str::to_string)
        .collect()
}

fn unexpected_payload(expected: EntityKind, payload: &CatalogPayload) -> EngineError {
    EngineError::RemoteError {
        status: 200,
        message: format!(
            "expected {} entry, got {} '{}'",
            expected,
            payload.kind(),
            payload.external_id()
        ),
    }
}

pub struct Reconciler {
    store: Arc<dyn EntityStore>,
    client: Arc<dyn CatalogClient>,
    settings: ReconcilerSettings,
    retry_policy: RetryPolicy,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn EntityStore>,
        client: Arc<dyn CatalogClient>,
        settings: ReconcilerSettings,
    ) -> Self {
        let retry_policy = RetryPolicy::new(&settings);
        Self {
            store,
            client,
            settings,
            retry_policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn client(&self) -> &Arc<dyn CatalogClient> {
        &self.client
    }

    // =========================================================================
    // Public resolve passes
    // =========================================================================

    pub async fn resolve_artists<I, S>(&self, ids: I) -> EngineResult<Resolution<Artist>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids = normalize_external_ids(ids)?;
        self.artists_pass(ids).await
    }

    pub async fn resolve_albums<I, S>(&self, ids: I) -> EngineResult<Resolution<Album>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids = normalize_external_ids(ids)?;
        self.albums_pass(ids).await
    }

    pub async fn resolve_tracks<I, S>(&self, ids: I) -> EngineResult<Resolution<Track>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids = normalize_external_ids(ids)?;
        self.tracks_pass(ids).await
    }

    /// Search the remote catalog and resolve every hit into a stored entity.
    ///
    /// An empty `types` searches all types.
    pub async fn search(
        &self,
        query: &str,
        types: &[SearchType],
        limit: usize,
    ) -> EngineResult<SearchResults> {
        let query = query.trim();
        if query.is_empty() {
            return Err(EngineError::EmptyInput);
        }
        let all = SearchType::ALL;
        let types: &[SearchType] = if types.is_empty() { &all } else { types };

        let (hits, _) = self
            .with_retry("search", || self.client.search(query, types, limit))
            .await?;
        debug!(
            "Search '{}' returned {} tracks, {} artists, {} albums",
            query,
            hits.tracks.len(),
            hits.artists.len(),
            hits.albums.len()
        );

        let (tracks, artists, albums) = futures::try_join!(
            self.tracks_pass(distinct_ids(hits.tracks.iter().map(String::as_str))),
            self.artists_pass(distinct_ids(hits.artists.iter().map(String::as_str))),
            self.albums_pass(distinct_ids(hits.albums.iter().map(String::as_str))),
        )?;

        Ok(SearchResults {
            tracks: tracks.entities,
            artists: artists.entities,
            albums: albums.entities,
        })
    }

    // =========================================================================
    // Passes over normalized ids
    // =========================================================================

    async fn artists_pass(&self, ids: Vec<String>) -> EngineResult<Resolution<Artist>> {
        self.named_pass(
            EntityKind::Artist,
            ids,
            |store, ids| store.find_artists(ids),
            |store, records| store.insert_artists(records),
        )
        .await
    }

    async fn albums_pass(&self, ids: Vec<String>) -> EngineResult<Resolution<Album>> {
        self.named_pass(
            EntityKind::Album,
            ids,
            |store, ids| store.find_albums(ids),
            |store, records| store.insert_albums(records),
        )
        .await
    }

    /// Resolve pass shared by the kinds stored as a bare (id, name) pair.
    async fn named_pass<T, F, G>(
        &self,
        kind: EntityKind,
        ids: Vec<String>,
        find: F,
        insert: G,
    ) -> EngineResult<Resolution<T>>
    where
        T: Keyed,
        F: Fn(&dyn EntityStore, &[String]) -> anyhow::Result<Vec<T>>,
        G: Fn(&dyn EntityStore, &[NewNamedEntity]) -> anyhow::Result<Vec<T>>,
    {
        if ids.is_empty() {
            return Ok(Resolution::empty(kind));
        }

        let mut found = find(self.store.as_ref(), &ids)?;
        let missing = self.missing_ids(&ids, &found);
        let mut resolution = Resolution::empty(kind);

        for chunk in missing.chunks(kind.batch_size(self.settings.max_batch_size)) {
            let (payloads, calls) = self.fetch_batch(kind, chunk).await?;
            resolution.remote_calls += calls;

            let mut records = Vec::with_capacity(chunk.len());
            for (id, payload) in chunk.iter().zip(payloads) {
                match payload {
                    Some(payload) if payload.kind() != kind => {
                        return Err(unexpected_payload(kind, &payload))
                    }
                    Some(CatalogPayload::Artist(ArtistPayload { name, .. }))
                    | Some(CatalogPayload::Album(AlbumPayload { name, .. })) => {
                        records.push(NewNamedEntity {
                            external_id: id.clone(),
                            name,
                        });
                    }
                    Some(other) => return Err(unexpected_payload(kind, &other)),
                    None => resolution.not_found.push(id.clone()),
                }
            }
            found.extend(insert(self.store.as_ref(), &records)?);
        }

        self.log_pass(kind, ids.len(), missing.len(), &resolution);
        resolution.entities = in_caller_order(&ids, found);
        Ok(resolution)
    }

    async fn tracks_pass(&self, ids: Vec<String>) -> EngineResult<Resolution<Track>> {
        let kind = EntityKind::Track;
        if ids.is_empty() {
            return Ok(Resolution::empty(kind));
        }

        let mut found = self.store.find_tracks(&ids)?;
        let missing = self.missing_ids(&ids, &found);
        let mut resolution = Resolution::empty(kind);

        for chunk in missing.chunks(kind.batch_size(self.settings.max_batch_size)) {
            let (payloads, calls) = self.fetch_batch(kind, chunk).await?;
            resolution.remote_calls += calls;

            let mut fetched: Vec<(&String, TrackPayload)> = Vec::with_capacity(chunk.len());
            for (id, payload) in chunk.iter().zip(payloads) {
                match payload {
                    Some(CatalogPayload::Track(track)) => fetched.push((id, track)),
                    Some(other) => return Err(unexpected_payload(kind, &other)),
                    None => resolution.not_found.push(id.clone()),
                }
            }
            if fetched.is_empty() {
                continue;
            }

            let artist_ids = distinct_ids(fetched.iter().flat_map(|(_, t)| t.artist_ids()));
            let album_ids = distinct_ids(fetched.iter().filter_map(|(_, t)| t.album_id()));
            let feature_ids: Vec<String> = fetched.iter().map(|(id, _)| (*id).clone()).collect();

            let (artists, albums, (features, feature_calls)) = futures::try_join!(
                self.artists_pass(artist_ids),
                self.albums_pass(album_ids),
                self.fetch_batch(EntityKind::AudioFeatures, &feature_ids),
            )?;
            resolution.remote_calls += artists.remote_calls + albums.remote_calls + feature_calls;

            let artists_by_id: HashMap<&str, i64> = artists
                .entities
                .iter()
                .map(|a| (a.external_id.as_str(), a.local_id))
                .collect();
            let albums_by_id: HashMap<&str, i64> = albums
                .entities
                .iter()
                .map(|a| (a.external_id.as_str(), a.local_id))
                .collect();

            let mut records = Vec::with_capacity(fetched.len());
            for ((id, track), feature) in fetched.iter().zip(features) {
                let features = match feature {
                    Some(CatalogPayload::AudioFeatures(payload)) => payload.features,
                    Some(other) => {
                        return Err(unexpected_payload(EntityKind::AudioFeatures, &other))
                    }
                    None => {
                        warn!("Track {} has no audio features remotely, skipping it", id);
                        resolution.not_found.push((*id).clone());
                        continue;
                    }
                };

                let mut artist_local_ids = Vec::new();
                for artist_id in distinct_ids(track.artist_ids()) {
                    match artists_by_id.get(artist_id.as_str()) {
                        Some(local_id) => artist_local_ids.push(*local_id),
                        None => warn!(
                            "Artist {} of track {} not found remotely, dropping it from the track",
                            artist_id, id
                        ),
                    }
                }
                if artist_local_ids.is_empty() {
                    warn!("Track {} has no resolvable artist, skipping it", id);
                    resolution.not_found.push((*id).clone());
                    continue;
                }

                let album_local_id = track
                    .album_id()
                    .and_then(|album_id| albums_by_id.get(album_id).copied());
                if album_local_id.is_none() {
                    debug!("Track {} stored without album", id);
                }

                records.push(NewTrack {
                    external_id: (*id).clone(),
                    name: track.name.clone(),
                    features,
                    album_local_id,
                    artist_local_ids,
                });
            }
            found.extend(self.store.insert_tracks(&records)?);
        }

        self.log_pass(kind, ids.len(), missing.len(), &resolution);
        resolution.entities = in_caller_order(&ids, found);
        Ok(resolution)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn missing_ids<T: Keyed>(&self, ids: &[String], found: &[T]) -> Vec<String> {
        let stored: HashSet<&str> = found.iter().map(Keyed::key).collect();
        ids.iter()
            .filter(|id| !stored.contains(id.as_str()))
            .cloned()
            .collect()
    }

    fn log_pass<T>(
        &self,
        kind: EntityKind,
        requested: usize,
        missing: usize,
        resolution: &Resolution<T>,
    ) {
        if missing == 0 {
            debug!("All {} {} ids already stored", requested, kind);
            return;
        }
        info!(
            "Resolved {} {} ids: {} stored, {} fetched, {} not found, {} remote calls",
            requested,
            kind,
            requested - missing,
            missing - resolution.not_found.len(),
            resolution.not_found.len(),
            resolution.remote_calls
        );
    }

    /// One batch call for `ids`, with timeout and retries.
    async fn fetch_batch(
        &self,
        kind: EntityKind,
        ids: &[String],
    ) -> EngineResult<(Vec<Option<CatalogPayload>>, usize)> {
        debug!("Fetching {} {} ids from remote catalog", ids.len(), kind);
        let (payloads, calls) = self
            .with_retry(kind.as_str(), || self.client.fetch_batch(kind, ids))
            .await?;
        if payloads.len() != ids.len() {
            return Err(EngineError::RemoteError {
                status: 200,
                message: format!(
                    "{} batch returned {} entries for {} ids",
                    kind,
                    payloads.len(),
                    ids.len()
                ),
            });
        }
        Ok((payloads, calls))
    }

    /// Run `call` under the request timeout, retrying transient failures.
    ///
    /// Returns the value and the number of attempts made.
    pub(crate) async fn with_retry<T, F, Fut>(
        &self,
        what: &str,
        mut call: F,
    ) -> EngineResult<(T, usize)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CatalogError>>,
    {
        let timeout = self.settings.request_timeout();
        let mut retry_count = 0u32;
        loop {
            let outcome = match tokio::time::timeout(timeout, call()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(CatalogError::Unavailable(format!(
                    "{} call timed out after {:?}",
                    what, timeout
                ))),
            };
            let attempts = retry_count as usize + 1;

            match outcome {
                Ok(value) => return Ok((value, attempts)),
                Err(err) if self.retry_policy.should_retry(&err, retry_count) => {
                    let delay = self.retry_policy.delay_for(&err, retry_count);
                    warn!(
                        "Remote {} call failed ({}), retry {}/{} in {:?}",
                        what,
                        err,
                        retry_count + 1,
                        self.retry_policy.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(err) => {
                    error!(
                        "Remote {} call failed after {} attempt(s): {}",
                        what, attempts, err
                    );
                    return Err(err.into());
                }
            }
        }
    }
}
