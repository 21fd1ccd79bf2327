//! Engine wiring over a temporary database and a fake remote catalog.

#![allow(dead_code)]

use super::constants::*;
use super::fake_client::FakeCatalogClient;
use std::sync::Arc;
use synai_catalog::catalog::AudioFeatures;
use synai_catalog::config::ReconcilerSettings;
use synai_catalog::{EntityStore, Reconciler, SqliteEntityStore};
use tempfile::TempDir;

pub struct TestEngine {
    pub store: Arc<SqliteEntityStore>,
    pub client: Arc<FakeCatalogClient>,
    pub reconciler: Arc<Reconciler>,
    _temp_dir: TempDir,
}

impl TestEngine {
    pub fn with_catalog(client: FakeCatalogClient) -> Self {
        Self::with_settings(client, zero_backoff_settings())
    }

    pub fn with_settings(client: FakeCatalogClient, settings: ReconcilerSettings) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let store =
            Arc::new(SqliteEntityStore::new(temp_dir.path().join("entities.db"), 2).unwrap());
        let client = Arc::new(client);
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            client.clone(),
            settings,
        ));
        Self {
            store,
            client,
            reconciler,
            _temp_dir: temp_dir,
        }
    }

    pub fn track_count(&self) -> usize {
        self.store.counts().unwrap().tracks
    }
}

/// Default settings without waiting between retries.
pub fn zero_backoff_settings() -> ReconcilerSettings {
    ReconcilerSettings {
        initial_backoff_ms: 0,
        max_backoff_ms: 0,
        ..Default::default()
    }
}

pub fn features(value: f64, tempo: f64) -> AudioFeatures {
    AudioFeatures {
        tempo,
        ..AudioFeatures::uniform(value)
    }
}

/// 3 artists, 2 albums, tracks 1..=6:
/// - tracks 1..=4: complete, artists 1 and 2 (track 4 also artist 3), album 1 or 2
/// - track 5: features missing remotely
/// - track 6: only artist is missing remotely
pub fn sample_catalog() -> FakeCatalogClient {
    let mut client = FakeCatalogClient::new()
        .with_artist(&artist_id(1), "Artist One")
        .with_artist(&artist_id(2), "Artist Two")
        .with_artist(&artist_id(3), "Artist Three")
        .with_album(&album_id(1), "Album One")
        .with_album(&album_id(2), "Album Two");
    for n in 1..=4 {
        let mut artists = vec![artist_id(1), artist_id(2)];
        if n == 4 {
            artists.push(artist_id(3));
        }
        let album = album_id(1 + n % 2);
        client = client.with_track(
            &track_id(n),
            &format!("Track {}", n),
            &artists,
            Some(&album),
            Some(features(0.1 * n as f64, 100.0 + n as f64)),
        );
    }
    client
        .with_track(
            &track_id(5),
            "No Features",
            &[artist_id(1)],
            Some(&album_id(1)),
            None,
        )
        .with_track(
            &track_id(6),
            "Ghost Artist",
            &[artist_id(99)],
            None,
            Some(features(0.5, 90.0)),
        )
}
