//! Audio feature vectors.
//!
//! Every track carries one `AudioFeatures` value; summaries computed over a
//! collection of tracks are also `AudioFeatures`, always built as fresh values.

use serde::{Deserialize, Serialize};

/// One dimension of an [`AudioFeatures`] vector.
///
/// The declaration order is the chart order used by dashboards and history views.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureDimension {
    Acousticness,
    Danceability,
    Energy,
    Instrumentalness,
    Liveness,
    Valence,
    Speechiness,
    Tempo,
}

impl FeatureDimension {
    pub const ALL: [FeatureDimension; 8] = [
        FeatureDimension::Acousticness,
        FeatureDimension::Danceability,
        FeatureDimension::Energy,
        FeatureDimension::Instrumentalness,
        FeatureDimension::Liveness,
        FeatureDimension::Valence,
        FeatureDimension::Speechiness,
        FeatureDimension::Tempo,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FeatureDimension::Acousticness => "acousticness",
            FeatureDimension::Danceability => "danceability",
            FeatureDimension::Energy => "energy",
            FeatureDimension::Instrumentalness => "instrumentalness",
            FeatureDimension::Liveness => "liveness",
            FeatureDimension::Valence => "valence",
            FeatureDimension::Speechiness => "speechiness",
            FeatureDimension::Tempo => "tempo",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.label() == label)
    }

    /// Whether values of this dimension live in `[0, 1]`. Tempo is in BPM.
    pub fn is_bounded(&self) -> bool {
        !matches!(self, FeatureDimension::Tempo)
    }
}

/// The 8-dimensional audio descriptor of a track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub acousticness: f64,
    pub danceability: f64,
    pub energy: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub valence: f64,
    pub speechiness: f64,
    pub tempo: f64,
}

impl AudioFeatures {
    pub fn get(&self, dimension: FeatureDimension) -> f64 {
        match dimension {
            FeatureDimension::Acousticness => self.acousticness,
            FeatureDimension::Danceability => self.danceability,
            FeatureDimension::Energy => self.energy,
            FeatureDimension::Instrumentalness => self.instrumentalness,
            FeatureDimension::Liveness => self.liveness,
            FeatureDimension::Valence => self.valence,
            FeatureDimension::Speechiness => self.speechiness,
            FeatureDimension::Tempo => self.tempo,
        }
    }

    fn slot_mut(&mut self, dimension: FeatureDimension) -> &mut f64 {
        match dimension {
            FeatureDimension::Acousticness => &mut self.acousticness,
            FeatureDimension::Danceability => &mut self.danceability,
            FeatureDimension::Energy => &mut self.energy,
            FeatureDimension::Instrumentalness => &mut self.instrumentalness,
            FeatureDimension::Liveness => &mut self.liveness,
            FeatureDimension::Valence => &mut self.valence,
            FeatureDimension::Speechiness => &mut self.speechiness,
            FeatureDimension::Tempo => &mut self.tempo,
        }
    }

    pub fn set(&mut self, dimension: FeatureDimension, value: f64) {
        *self.slot_mut(dimension) = value;
    }

    /// Build a vector by evaluating `f` once per dimension.
    pub fn from_fn(mut f: impl FnMut(FeatureDimension) -> f64) -> Self {
        let mut features = AudioFeatures::default();
        for dimension in FeatureDimension::ALL {
            features.set(dimension, f(dimension));
        }
        features
    }

    /// A vector with the same value in every dimension. Mostly useful in tests.
    pub fn uniform(value: f64) -> Self {
        Self::from_fn(|_| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_cover_every_dimension() {
        let mut features = AudioFeatures::default();
        for (i, dimension) in FeatureDimension::ALL.iter().enumerate() {
            features.set(*dimension, i as f64);
        }
        assert_eq!(features.acousticness, 0.0);
        assert_eq!(features.speechiness, 6.0);
        assert_eq!(features.tempo, 7.0);
        for (i, dimension) in FeatureDimension::ALL.iter().enumerate() {
            assert_eq!(features.get(*dimension), i as f64);
        }
    }

    #[test]
    fn test_only_tempo_is_unbounded() {
        let unbounded: Vec<_> = FeatureDimension::ALL
            .iter()
            .filter(|d| !d.is_bounded())
            .collect();
        assert_eq!(unbounded, vec![&FeatureDimension::Tempo]);
    }

    #[test]
    fn test_deserialize_from_payload_shape() {
        let json = r#"{"acousticness":0.1,"danceability":0.2,"energy":0.3,
            "instrumentalness":0.4,"liveness":0.5,"valence":0.6,"speechiness":0.7,"tempo":120.5}"#;
        let features: AudioFeatures = serde_json::from_str(json).unwrap();
        assert_eq!(features.valence, 0.6);
        assert_eq!(features.tempo, 120.5);
    }

    #[test]
    fn test_from_label_matches_label() {
        for dimension in FeatureDimension::ALL {
            assert_eq!(FeatureDimension::from_label(dimension.label()), Some(dimension));
        }
        assert_eq!(FeatureDimension::from_label("loudness"), None);
    }
}
