//! Analysis engine: reduces an enriched track set to a taste profile.
//!
//! Descriptor means are computed over the feature-bearing subset; duration
//! and popularity cover the full track list. Categorical dominants and the
//! artist ranking use explicit total tie-break orders (smallest value,
//! alphabetical name) so results are reproducible across runs.

use super::SyncError;
use crate::playlist_store::{AnalysisStatus, ArtistCount, AudioFeatures, PlaylistAnalysis, Track};
use chrono::Utc;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

/// Reduces a playlist's tracks into a [`PlaylistAnalysis`] snapshot.
pub struct AnalysisEngine {
    /// How many feature-bearing track ids to expose as recommendation seeds.
    pub seed_track_count: usize,
    /// Ranking truncation for the artist list.
    pub top_artists_limit: usize,
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self {
            seed_track_count: 5,
            top_artists_limit: 10,
        }
    }
}

impl AnalysisEngine {
    /// Analyze a track set.
    ///
    /// Fails with `InvalidState` when there are no tracks or no track
    /// carries a feature vector.
    pub fn analyze(&self, tracks: &[Track]) -> Result<PlaylistAnalysis, SyncError> {
        let started = Instant::now();

        if tracks.is_empty() {
            return Err(SyncError::InvalidState(
                "playlist has no tracks to analyze".to_string(),
            ));
        }

        let with_features: Vec<(&Track, &AudioFeatures)> = tracks
            .iter()
            .filter_map(|t| t.audio_features.as_ref().map(|f| (t, f)))
            .collect();
        if with_features.is_empty() {
            return Err(SyncError::InvalidState(
                "no tracks carry audio features; enrich first".to_string(),
            ));
        }

        let feature_count = with_features.len() as f64;
        let mut sums = DescriptorSums::default();
        for (_, f) in &with_features {
            sums.acousticness += f.acousticness;
            sums.danceability += f.danceability;
            sums.energy += f.energy;
            sums.instrumentalness += f.instrumentalness;
            sums.liveness += f.liveness;
            sums.loudness += f.loudness;
            sums.speechiness += f.speechiness;
            sums.valence += f.valence;
            sums.tempo += f.tempo;
        }

        let avg_valence = sums.valence / feature_count;
        let avg_energy = sums.energy / feature_count;
        let avg_danceability = sums.danceability / feature_count;

        let total_duration_ms: u64 = tracks.iter().map(|t| t.duration_ms).sum();
        let average_popularity =
            tracks.iter().map(|t| t.popularity as f64).sum::<f64>() / tracks.len() as f64;

        let dominant_key = dominant_value(with_features.iter().map(|(_, f)| f.key));
        let dominant_mode = dominant_value(with_features.iter().map(|(_, f)| f.mode));
        let dominant_time_signature =
            dominant_value(with_features.iter().map(|(_, f)| f.time_signature));

        let (top_artists, unique_artists_count) = rank_artists(tracks, self.top_artists_limit);

        let recommendation_seed_tracks: Vec<String> = with_features
            .iter()
            .take(self.seed_track_count)
            .map(|(t, _)| t.id.clone())
            .collect();

        let analysis = PlaylistAnalysis {
            status: AnalysisStatus::Completed,
            total_tracks: with_features.len(),
            total_duration_ms,
            average_popularity,
            avg_acousticness: sums.acousticness / feature_count,
            avg_danceability,
            avg_energy,
            avg_instrumentalness: sums.instrumentalness / feature_count,
            avg_liveness: sums.liveness / feature_count,
            avg_loudness: sums.loudness / feature_count,
            avg_speechiness: sums.speechiness / feature_count,
            avg_valence,
            avg_tempo: sums.tempo / feature_count,
            dominant_key,
            dominant_mode,
            dominant_time_signature,
            top_artists,
            unique_artists_count,
            mood_description: mood_description(avg_valence, avg_energy, avg_danceability)
                .to_string(),
            energy_level: level(avg_energy).to_string(),
            danceability_level: level(avg_danceability).to_string(),
            recommendation_seed_tracks,
            analysis_duration_seconds: started.elapsed().as_secs_f64(),
            analyzed_at: Utc::now(),
        };

        debug!(
            "Analyzed {} tracks ({} with features) in {:.3}s",
            tracks.len(),
            feature_count,
            analysis.analysis_duration_seconds
        );

        Ok(analysis)
    }
}

#[derive(Default)]
struct DescriptorSums {
    acousticness: f64,
    danceability: f64,
    energy: f64,
    instrumentalness: f64,
    liveness: f64,
    loudness: f64,
    speechiness: f64,
    valence: f64,
    tempo: f64,
}

/// Most frequent value; ties resolve to the smallest value.
///
/// The BTreeMap iterates keys in ascending order, so keeping the first
/// strict maximum gives the smallest of the tied maxima.
fn dominant_value(values: impl Iterator<Item = i32>) -> i32 {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut best_value = 0;
    let mut best_count = 0;
    for (value, count) in counts {
        if count > best_count {
            best_value = value;
            best_count = count;
        }
    }
    best_value
}

/// Count track-appearances per artist name across the full track list,
/// rank by count descending with alphabetical tie-break, truncate.
///
/// Returns the truncated ranking and the total number of unique artists.
fn rank_artists(tracks: &[Track], limit: usize) -> (Vec<ArtistCount>, usize) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for track in tracks {
        for artist in &track.artists {
            *counts.entry(artist.name.as_str()).or_insert(0) += 1;
        }
    }
    let unique = counts.len();

    let mut ranked: Vec<ArtistCount> = counts
        .into_iter()
        .map(|(name, track_count)| ArtistCount {
            name: name.to_string(),
            track_count,
        })
        .collect();
    // Already alphabetical from the BTreeMap; a stable sort by count keeps
    // that order within ties.
    ranked.sort_by(|a, b| b.track_count.cmp(&a.track_count));
    ranked.truncate(limit);

    (ranked, unique)
}

/// Ordered mood rule table over the descriptor means; first match wins.
fn mood_description(valence: f64, energy: f64, danceability: f64) -> &'static str {
    if valence > 0.7 && energy > 0.7 {
        "upbeat/energetic"
    } else if valence > 0.7 && energy < 0.4 {
        "happy/relaxed"
    } else if valence < 0.3 && energy > 0.6 {
        "intense/dramatic"
    } else if valence < 0.3 && energy < 0.4 {
        "melancholic/introspective"
    } else if danceability > 0.8 {
        "highly danceable"
    } else if energy > 0.8 {
        "high energy"
    } else if valence > 0.6 {
        "positive/uplifting"
    } else if valence < 0.4 {
        "melancholic/contemplative"
    } else {
        "balanced"
    }
}

fn level(value: f64) -> &'static str {
    if value > 0.7 {
        "high"
    } else if value > 0.4 {
        "medium"
    } else {
        "low"
    }
}
