//! Mean feature vectors, per-day buckets and chart series.
//!
//! Everything here is pure: no store, no clock.

use crate::catalog::{Analysis, AudioFeatures, FeatureDimension};
use crate::error::{EngineError, EngineResult};
use chrono::NaiveDate;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

fn mean<'a>(vectors: impl IntoIterator<Item = &'a AudioFeatures>) -> Option<AudioFeatures> {
    let mut sums = AudioFeatures::default();
    let mut count = 0usize;
    for vector in vectors {
        for dimension in FeatureDimension::ALL {
            sums.set(dimension, sums.get(dimension) + vector.get(dimension));
        }
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(AudioFeatures::from_fn(|dimension| {
        sums.get(dimension) / count as f64
    }))
}

/// Per-dimension arithmetic mean, summed in input order.
///
/// The result is always a fresh vector, also for a single input.
pub fn summarize<'a, I>(vectors: I) -> EngineResult<AudioFeatures>
where
    I: IntoIterator<Item = &'a AudioFeatures>,
{
    mean(vectors).ok_or(EngineError::EmptyInput)
}

/// A contiguous run of analyses created on the same (UTC) day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayBucket {
    pub day: NaiveDate,
    pub summary: AudioFeatures,
    /// Number of analyses in the run.
    pub analyses: usize,
}

impl DayBucket {
    pub fn label(&self) -> String {
        self.day.format("%Y-%m-%d").to_string()
    }
}

/// Group analyses into runs of the same calendar day.
///
/// Input must be ascending by creation time. Only adjacent analyses are merged:
/// a day that reappears after another day starts a new bucket.
pub fn bucket_by_day(analyses: &[Analysis]) -> Vec<DayBucket> {
    analyses
        .chunk_by(|a, b| a.created_at.date_naive() == b.created_at.date_naive())
        .filter_map(|run| {
            let summary = mean(run.iter().map(|a| &a.summary))?;
            Some(DayBucket {
                day: run[0].created_at.date_naive(),
                summary,
                analyses: run.len(),
            })
        })
        .collect()
}

/// One chart line: a dimension and its value in each input vector.
///
/// Serializes as `[label, v1, v2, ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRow {
    pub dimension: FeatureDimension,
    pub values: Vec<f64>,
}

impl Serialize for ChartRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.values.len() + 1))?;
        seq.serialize_element(self.dimension.label())?;
        for value in &self.values {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

/// Transpose vectors into one row per dimension, in chart order.
pub fn chart_series<'a, I>(vectors: I) -> Vec<ChartRow>
where
    I: IntoIterator<Item = &'a AudioFeatures>,
{
    let vectors: Vec<&AudioFeatures> = vectors.into_iter().collect();
    FeatureDimension::ALL
        .iter()
        .map(|dimension| ChartRow {
            dimension: *dimension,
            values: vectors.iter().map(|v| v.get(*dimension)).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const EPS: f64 = 1e-9;

    fn assert_close(actual: &AudioFeatures, expected: &AudioFeatures) {
        for dimension in FeatureDimension::ALL {
            let (a, e) = (actual.get(dimension), expected.get(dimension));
            assert!(
                (a - e).abs() < EPS,
                "{}: expected {}, got {}",
                dimension.label(),
                e,
                a
            );
        }
    }

    fn sample() -> AudioFeatures {
        AudioFeatures {
            acousticness: 0.12,
            danceability: 0.73,
            energy: 0.9,
            instrumentalness: 0.0,
            liveness: 0.33,
            valence: 0.41,
            speechiness: 0.05,
            tempo: 128.4,
        }
    }

    fn analysis_at(local_id: i64, day: u32, hour: u32, value: f64) -> Analysis {
        Analysis {
            local_id,
            user_id: "alice".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap(),
            tracks: vec![],
            songs_len: 0,
            summary: AudioFeatures::uniform(value),
        }
    }

    #[test]
    fn test_summarize_single_vector_is_itself() {
        let v = sample();
        assert_eq!(summarize([&v]).unwrap(), v);
    }

    #[test]
    fn test_summarize_copies_is_itself() {
        let v = sample();
        let copies = vec![v; 7];
        assert_close(&summarize(&copies).unwrap(), &v);
    }

    #[test]
    fn test_summarize_pair_is_midpoint() {
        let a = sample();
        let b = AudioFeatures::uniform(0.5);
        let mean = summarize([&a, &b]).unwrap();
        let expected = AudioFeatures::from_fn(|d| (a.get(d) + b.get(d)) / 2.0);
        assert_close(&mean, &expected);
    }

    #[test]
    fn test_summarize_empty_fails() {
        let empty: Vec<AudioFeatures> = vec![];
        assert!(matches!(summarize(&empty), Err(EngineError::EmptyInput)));
    }

    #[test]
    fn test_bucket_by_day_is_contiguous_runs() {
        let analyses = vec![
            analysis_at(1, 1, 8, 0.1),
            analysis_at(2, 1, 20, 0.3),
            analysis_at(3, 2, 9, 0.5),
            analysis_at(4, 2, 10, 0.5),
            analysis_at(5, 2, 23, 0.8),
            // same day as the first run, but not adjacent
            analysis_at(6, 1, 12, 0.9),
        ];

        let buckets = bucket_by_day(&analyses);

        let sizes: Vec<_> = buckets.iter().map(|b| b.analyses).collect();
        assert_eq!(sizes, vec![2, 3, 1]);
        let labels: Vec<_> = buckets.iter().map(|b| b.label()).collect();
        assert_eq!(labels, vec!["2024-05-01", "2024-05-02", "2024-05-01"]);
        assert_close(&buckets[0].summary, &AudioFeatures::uniform(0.2));
        assert_close(&buckets[1].summary, &AudioFeatures::uniform(0.6));
        assert_eq!(buckets[2].summary, AudioFeatures::uniform(0.9));
    }

    #[test]
    fn test_bucket_by_day_empty() {
        assert!(bucket_by_day(&[]).is_empty());
    }

    #[test]
    fn test_chart_series_transposes() {
        let a = AudioFeatures::uniform(0.25);
        let b = sample();
        let rows = chart_series([&a, &b]);

        assert_eq!(rows.len(), 8);
        assert_eq!(rows[0].dimension, FeatureDimension::Acousticness);
        assert_eq!(rows[0].values, vec![0.25, 0.12]);
        assert_eq!(rows[7].dimension, FeatureDimension::Tempo);
        assert_eq!(rows[7].values, vec![0.25, 128.4]);
    }

    #[test]
    fn test_chart_row_serializes_label_first() {
        let v = sample();
        let rows = chart_series([&v]);
        let json = serde_json::to_value(&rows).unwrap();
        assert_eq!(json[2], serde_json::json!(["energy", 0.9]));
        assert_eq!(json[7], serde_json::json!(["tempo", 128.4]));
    }
}
