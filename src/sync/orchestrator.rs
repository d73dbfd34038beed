//! Pipeline orchestrator.
//!
//! Owns the foreground sync entry points and the detached background tasks
//! for enrichment and analysis. At most one background task runs per
//! playlist; a second start request while one is in flight is rejected
//! rather than queued. Background failures are persisted on the playlist
//! document so the status query can report them after the task is gone.

use super::analysis::AnalysisEngine;
use super::enricher::{EnrichmentOutcome, FeatureEnricher};
use super::staleness::{is_stale, DEFAULT_TTL};
use super::synchronizer::TrackSynchronizer;
use super::SyncError;
use crate::catalog::CatalogPort;
use crate::playlist_store::{AnalysisStatus, Playlist, PlaylistStore, Track};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Tunables for the pipeline.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Cache freshness window in seconds.
    pub ttl_secs: u64,
    /// Recommendation seeds exposed per analysis.
    pub seed_track_count: usize,
    /// Artist ranking truncation.
    pub top_artists_limit: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL.as_secs(),
            seed_track_count: 5,
            top_artists_limit: 10,
        }
    }
}

/// How far along the pipeline a playlist is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    NotSynced,
    TracksFetched,
    FeaturesFetched,
    Analyzed,
    Failed,
}

/// Condensed analysis fields for the status response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub mood_description: String,
    pub energy_level: String,
    pub danceability_level: String,
    pub total_tracks: usize,
}

/// Answer to the status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub playlist_id: String,
    pub state: SyncState,
    pub track_count: usize,
    pub tracks_with_features: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fetched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_analyzed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_summary: Option<AnalysisSummary>,
}

/// Whether a background start request took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

pub struct SyncOrchestrator {
    store: Arc<dyn PlaylistStore>,
    synchronizer: TrackSynchronizer,
    enricher: FeatureEnricher,
    engine: AnalysisEngine,
    ttl: Duration,
    shutdown: CancellationToken,
    in_flight: Mutex<HashMap<String, CancellationToken>>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn PlaylistStore>,
        catalog: Arc<dyn CatalogPort>,
        settings: SyncSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let ttl = Duration::from_secs(settings.ttl_secs);
        Self {
            store: store.clone(),
            synchronizer: TrackSynchronizer::new(store.clone(), catalog.clone(), ttl),
            enricher: FeatureEnricher::new(store, catalog, ttl),
            engine: AnalysisEngine {
                seed_track_count: settings.seed_track_count,
                top_artists_limit: settings.top_artists_limit,
            },
            ttl,
            shutdown,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Refresh the cached playlist set for a user. Foreground.
    pub async fn sync_playlists(
        &self,
        user_id: &str,
        token: &str,
        force: bool,
    ) -> Result<Vec<Playlist>, SyncError> {
        self.synchronizer.sync_playlists(user_id, token, force).await
    }

    /// Refresh the track list of one playlist. Foreground.
    pub async fn sync_tracks(
        &self,
        playlist_id: &str,
        token: &str,
        force: bool,
    ) -> Result<Vec<Track>, SyncError> {
        self.synchronizer.sync_tracks(playlist_id, token, force).await
    }

    /// Kick off feature enrichment as a background task.
    ///
    /// Validates the stage precondition up front so the caller gets the
    /// error instead of finding it later in the status.
    pub fn start_enrichment(
        self: &Arc<Self>,
        playlist_id: &str,
        token: &str,
    ) -> Result<StartOutcome, SyncError> {
        self.require_tracks_fetched(playlist_id)?;

        let Some(task_token) = self.try_claim(playlist_id) else {
            return Ok(StartOutcome::AlreadyRunning);
        };

        let this = self.clone();
        let playlist_id = playlist_id.to_string();
        let token = token.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {
                    info!("Enrichment of playlist {} cancelled", playlist_id);
                }
                result = this.enricher.enrich(&playlist_id, &token) => {
                    this.finish_enrichment(&playlist_id, result);
                }
            }
            this.release(&playlist_id);
        });

        Ok(StartOutcome::Started)
    }

    /// Kick off analysis as a background task.
    ///
    /// Runs enrichment first when the playlist is missing features or has
    /// gone stale, then reduces the track set and persists the snapshot.
    pub fn start_analysis(
        self: &Arc<Self>,
        playlist_id: &str,
        token: &str,
    ) -> Result<StartOutcome, SyncError> {
        self.require_tracks_fetched(playlist_id)?;

        let Some(task_token) = self.try_claim(playlist_id) else {
            return Ok(StartOutcome::AlreadyRunning);
        };

        let this = self.clone();
        let playlist_id = playlist_id.to_string();
        let token = token.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {
                    info!("Analysis of playlist {} cancelled", playlist_id);
                }
                result = this.run_analysis(&playlist_id, &token) => {
                    if let Err(e) = result {
                        warn!("Analysis of playlist {} failed: {}", playlist_id, e);
                        this.record_failure(&playlist_id, &e);
                    }
                }
            }
            this.release(&playlist_id);
        });

        Ok(StartOutcome::Started)
    }

    async fn run_analysis(&self, playlist_id: &str, token: &str) -> Result<(), SyncError> {
        let playlist = self
            .store
            .get(playlist_id)?
            .ok_or_else(|| SyncError::NotFound(playlist_id.to_string()))?;

        if !playlist.audio_features_fetched
            || is_stale(playlist.last_fetched_at, Utc::now(), self.ttl)
        {
            self.enricher.enrich(playlist_id, token).await?;
        }

        // Reload: enrichment may have rewritten the document.
        let mut playlist = self
            .store
            .get(playlist_id)?
            .ok_or_else(|| SyncError::NotFound(playlist_id.to_string()))?;

        let analysis = self.engine.analyze(&playlist.tracks)?;
        info!(
            "Analysis of playlist {} complete: {} tracks, mood {}",
            playlist_id, analysis.total_tracks, analysis.mood_description
        );
        playlist.mark_analysis_complete(analysis, Utc::now());
        self.store.upsert(&playlist)?;
        Ok(())
    }

    /// Current pipeline position and last outcome for a playlist.
    pub fn status(&self, playlist_id: &str) -> Result<SyncStatus, SyncError> {
        let playlist = self
            .store
            .get(playlist_id)?
            .ok_or_else(|| SyncError::NotFound(playlist_id.to_string()))?;

        let analysis_summary = playlist.analysis.as_ref().map(|a| AnalysisSummary {
            mood_description: a.mood_description.clone(),
            energy_level: a.energy_level.clone(),
            danceability_level: a.danceability_level.clone(),
            total_tracks: a.total_tracks,
        });

        Ok(SyncStatus {
            playlist_id: playlist.id.clone(),
            state: derive_state(&playlist),
            track_count: playlist.tracks.len(),
            tracks_with_features: playlist.tracks_with_features(),
            last_fetched_at: playlist.last_fetched_at,
            last_analyzed_at: playlist.last_analyzed_at,
            last_error: playlist.last_error,
            analysis_summary,
        })
    }

    /// Drop a playlist from the cache, cancelling any in-flight task.
    pub fn delete_playlist(&self, playlist_id: &str) -> Result<bool, SyncError> {
        if let Some(token) = self.in_flight.lock().unwrap().remove(playlist_id) {
            token.cancel();
        }
        Ok(self.store.delete(playlist_id)?)
    }

    fn require_tracks_fetched(&self, playlist_id: &str) -> Result<(), SyncError> {
        let playlist = self
            .store
            .get(playlist_id)?
            .ok_or_else(|| SyncError::NotFound(playlist_id.to_string()))?;
        if !playlist.tracks_fetched {
            return Err(SyncError::InvalidState(format!(
                "playlist {} has no fetched tracks; sync tracks first",
                playlist_id
            )));
        }
        Ok(())
    }

    /// Claim the per-playlist slot, or None when a task already holds it.
    fn try_claim(&self, playlist_id: &str) -> Option<CancellationToken> {
        let mut in_flight = self.in_flight.lock().unwrap();
        if in_flight.contains_key(playlist_id) {
            return None;
        }
        let token = self.shutdown.child_token();
        in_flight.insert(playlist_id.to_string(), token.clone());
        Some(token)
    }

    fn release(&self, playlist_id: &str) {
        self.in_flight.lock().unwrap().remove(playlist_id);
    }

    fn finish_enrichment(&self, playlist_id: &str, result: Result<EnrichmentOutcome, SyncError>) {
        match result {
            Ok(outcome) if outcome.skipped => {
                info!("Enrichment of playlist {} skipped, cache fresh", playlist_id)
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Enrichment of playlist {} failed: {}", playlist_id, e);
                self.record_failure(playlist_id, &e);
            }
        }
    }

    fn record_failure(&self, playlist_id: &str, reason: &SyncError) {
        let update = || -> Result<(), SyncError> {
            let Some(mut playlist) = self.store.get(playlist_id)? else {
                return Ok(());
            };
            playlist.mark_failed(reason.to_string(), Utc::now());
            self.store.upsert(&playlist)?;
            Ok(())
        };
        if let Err(e) = update() {
            error!(
                "Could not record failure for playlist {}: {}",
                playlist_id, e
            );
        }
    }
}

fn derive_state(playlist: &Playlist) -> SyncState {
    if playlist.last_error.is_some() {
        SyncState::Failed
    } else if playlist
        .analysis
        .as_ref()
        .is_some_and(|a| a.status == AnalysisStatus::Completed)
    {
        SyncState::Analyzed
    } else if playlist.audio_features_fetched {
        SyncState::FeaturesFetched
    } else if playlist.tracks_fetched {
        SyncState::TracksFetched
    } else {
        SyncState::NotSynced
    }
}
