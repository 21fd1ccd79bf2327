//! Analyses: persisted summaries of a set of tracks, and the views built on them.

mod aggregator;

pub use aggregator::{bucket_by_day, chart_series, summarize, ChartRow, DayBucket};

use crate::catalog::{Analysis, NewAnalysis, Track};
use crate::entity_store::EntityStore;
use crate::error::EngineResult;
use chrono::Utc;
use serde::Serialize;
use tracing::info;

/// Per-day history of a user's analyses.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub buckets: Vec<DayBucket>,
    /// One column per bucket.
    pub chart: Vec<ChartRow>,
}

/// The latest analysis of a user.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub analysis: Analysis,
    pub chart: Vec<ChartRow>,
}

/// Summarize `tracks` and store the result as a new analysis of `user_id`.
pub fn record_analysis(
    store: &dyn EntityStore,
    user_id: &str,
    tracks: &[Track],
) -> EngineResult<Analysis> {
    let summary = summarize(tracks.iter().map(|t| &t.features))?;
    let analysis = store.create_analysis(&NewAnalysis {
        user_id: user_id.to_string(),
        created_at: Utc::now(),
        track_local_ids: tracks.iter().map(|t| t.local_id).collect(),
        summary,
    })?;
    info!(
        "Recorded analysis {} for user {} over {} tracks",
        analysis.local_id, user_id, analysis.songs_len
    );
    Ok(analysis)
}

pub fn history(store: &dyn EntityStore, user_id: &str) -> EngineResult<HistoryView> {
    let analyses = store.list_analyses(user_id)?;
    let buckets = bucket_by_day(&analyses);
    let chart = chart_series(buckets.iter().map(|b| &b.summary));
    Ok(HistoryView { buckets, chart })
}

pub fn dashboard(store: &dyn EntityStore, user_id: &str) -> EngineResult<Option<DashboardView>> {
    Ok(store.latest_analysis(user_id)?.map(|analysis| {
        let chart = chart_series([&analysis.summary]);
        DashboardView { analysis, chart }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AudioFeatures, NewNamedEntity, NewTrack};
    use crate::entity_store::SqliteEntityStore;
    use crate::error::EngineError;
    use chrono::{DateTime, TimeZone};
    use tempfile::TempDir;

    fn store_with_tracks(values: &[f64]) -> (TempDir, SqliteEntityStore, Vec<Track>) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteEntityStore::new(temp_dir.path().join("entities.db"), 1).unwrap();
        let artists = store
            .insert_artists(&[NewNamedEntity {
                external_id: "artist".to_string(),
                name: "Artist".to_string(),
            }])
            .unwrap();
        let records: Vec<NewTrack> = values
            .iter()
            .enumerate()
            .map(|(i, v)| NewTrack {
                external_id: format!("track_{}", i),
                name: format!("Track {}", i),
                features: AudioFeatures::uniform(*v),
                album_local_id: None,
                artist_local_ids: vec![artists[0].local_id],
            })
            .collect();
        let tracks = store.insert_tracks(&records).unwrap();
        (temp_dir, store, tracks)
    }

    #[test]
    fn test_record_analysis_summarizes_and_keeps_order() {
        let (_dir, store, mut tracks) = store_with_tracks(&[0.2, 0.4]);
        tracks.reverse();

        let analysis = record_analysis(&store, "alice", &tracks).unwrap();

        assert_eq!(analysis.songs_len, 2);
        assert!((analysis.summary.energy - 0.3).abs() < 1e-9);
        let order: Vec<_> = analysis.tracks.iter().map(|t| t.local_id).collect();
        assert_eq!(order, tracks.iter().map(|t| t.local_id).collect::<Vec<_>>());
    }

    #[test]
    fn test_record_analysis_without_tracks_fails() {
        let (_dir, store, _) = store_with_tracks(&[]);
        let result = record_analysis(&store, "alice", &[]);
        assert!(matches!(result, Err(EngineError::EmptyInput)));
        assert_eq!(store.counts().unwrap().analyses, 0);
    }

    fn analysis_at(tracks: &[Track], created_at: DateTime<Utc>) -> NewAnalysis {
        NewAnalysis {
            user_id: "alice".to_string(),
            created_at,
            track_local_ids: tracks.iter().map(|t| t.local_id).collect(),
            summary: summarize(tracks.iter().map(|t| &t.features)).unwrap(),
        }
    }

    #[test]
    fn test_history_and_dashboard() {
        let (_dir, store, tracks) = store_with_tracks(&[0.2, 0.6]);
        assert!(dashboard(&store, "alice").unwrap().is_none());
        assert!(history(&store, "alice").unwrap().buckets.is_empty());

        let morning = Utc.with_ymd_and_hms(2024, 6, 3, 8, 30, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2024, 6, 3, 21, 0, 0).unwrap();
        store.create_analysis(&analysis_at(&tracks[..1], morning)).unwrap();
        let latest = store.create_analysis(&analysis_at(&tracks, evening)).unwrap();

        // same calendar day, so one bucket
        let view = history(&store, "alice").unwrap();
        assert_eq!(view.buckets.len(), 1);
        assert_eq!(view.buckets[0].analyses, 2);
        assert_eq!(view.buckets[0].label(), "2024-06-03");
        assert_eq!(view.chart.len(), 8);
        assert_eq!(view.chart[0].values.len(), 1);

        let dash = dashboard(&store, "alice").unwrap().unwrap();
        assert_eq!(dash.analysis.local_id, latest.local_id);
        assert_eq!(dash.chart[2].values, vec![latest.summary.energy]);
    }
}
