//! Data models for cached playlists.
//!
//! A `Playlist` is the unit of storage: one document per playlist from the
//! external catalog, owned by the internal user account that synced it.
//! Tracks are embedded in their playlist and have no identity of their own
//! across playlists; a track re-fetch replaces the whole list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Artist credit on a track (name plus external catalog id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackArtist {
    pub id: String,
    pub name: String,
}

/// Album reference on a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackAlbum {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
}

/// Acoustic feature vector attached to a track.
///
/// The unit-interval descriptors are constrained to [0, 1], loudness to
/// [-60, 0] dBFS, tempo must be positive, key is a pitch class (-1 meaning
/// undetected), mode is 0 (minor) or 1 (major) and time_signature counts
/// beats per bar (1..=7). Bounds are enforced by
/// [`validate_audio_features`](super::validation::validate_audio_features)
/// when vectors come in from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub acousticness: f64,
    pub danceability: f64,
    pub energy: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub loudness: f64,
    pub speechiness: f64,
    pub valence: f64,
    pub tempo: f64,
    pub key: i32,
    pub mode: i32,
    pub time_signature: i32,
}

/// A track embedded in a playlist document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<TrackArtist>,
    pub album: TrackAlbum,
    pub duration_ms: u64,
    pub popularity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub external_urls: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_features: Option<AudioFeatures>,
}

/// Owner of a playlist on the external catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistOwner {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Cover image reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Status of a playlist analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// An artist entry in the analysis ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistCount {
    pub name: String,
    pub track_count: usize,
}

/// Derived taste profile for a playlist.
///
/// Computed whole on each analysis run; a new snapshot replaces the
/// previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistAnalysis {
    pub status: AnalysisStatus,
    /// Number of feature-bearing tracks the descriptor means cover.
    pub total_tracks: usize,
    pub total_duration_ms: u64,
    pub average_popularity: f64,
    pub avg_acousticness: f64,
    pub avg_danceability: f64,
    pub avg_energy: f64,
    pub avg_instrumentalness: f64,
    pub avg_liveness: f64,
    pub avg_loudness: f64,
    pub avg_speechiness: f64,
    pub avg_valence: f64,
    pub avg_tempo: f64,
    pub dominant_key: i32,
    pub dominant_mode: i32,
    pub dominant_time_signature: i32,
    pub top_artists: Vec<ArtistCount>,
    pub unique_artists_count: usize,
    pub mood_description: String,
    pub energy_level: String,
    pub danceability_level: String,
    pub recommendation_seed_tracks: Vec<String>,
    pub analysis_duration_seconds: f64,
    pub analyzed_at: DateTime<Utc>,
}

/// Cached copy of a playlist from the external catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    /// External catalog id, unique across the store.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Track count declared by the catalog, which may differ from
    /// `tracks.len()` until a track sync runs.
    pub track_count: usize,
    pub public: bool,
    pub collaborative: bool,
    pub owner: PlaylistOwner,
    /// Internal account this cached copy belongs to.
    pub user_id: String,
    #[serde(default)]
    pub images: Vec<PlaylistImage>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub external_urls: HashMap<String, String>,
    /// Provider-supplied change token, refreshed on every playlist sync.
    pub snapshot_id: String,

    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub tracks_fetched: bool,
    #[serde(default)]
    pub audio_features_fetched: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<PlaylistAnalysis>,
    /// Reason of the last failed background operation, cleared on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fetched_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_analyzed_at: Option<DateTime<Utc>>,
}

impl Playlist {
    /// Mark the track list as freshly fetched.
    pub fn mark_tracks_fetched(&mut self, now: DateTime<Utc>) {
        self.tracks_fetched = true;
        self.last_fetched_at = Some(now);
        self.updated_at = now;
    }

    /// Attach a completed analysis snapshot, discarding the previous one.
    pub fn mark_analysis_complete(&mut self, analysis: PlaylistAnalysis, now: DateTime<Utc>) {
        self.analysis = Some(analysis);
        self.last_analyzed_at = Some(now);
        self.last_error = None;
        self.updated_at = now;
    }

    /// Record a failed background operation so the reason survives for the
    /// status query.
    pub fn mark_failed(&mut self, reason: String, now: DateTime<Utc>) {
        if let Some(analysis) = &mut self.analysis {
            analysis.status = AnalysisStatus::Failed;
        }
        self.last_error = Some(reason);
        self.updated_at = now;
    }

    /// Drop the retained failure after a later pass succeeds. A snapshot
    /// the failure had marked failed goes back to pending so it is not
    /// reported as current.
    pub fn clear_failure(&mut self, now: DateTime<Utc>) {
        if let Some(analysis) = &mut self.analysis {
            if analysis.status == AnalysisStatus::Failed {
                analysis.status = AnalysisStatus::Pending;
            }
        }
        self.last_error = None;
        self.updated_at = now;
    }

    /// Number of tracks carrying a feature vector.
    pub fn tracks_with_features(&self) -> usize {
        self.tracks
            .iter()
            .filter(|t| t.audio_features.is_some())
            .count()
    }
}
