//! Feature enricher: attaches acoustic feature vectors to tracks.

use super::staleness::is_stale;
use super::SyncError;
use crate::catalog::CatalogPort;
use crate::playlist_store::{validate_audio_features, AudioFeatures, PlaylistStore};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What an enrichment pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentOutcome {
    /// True when the playlist was already enriched and fresh.
    pub skipped: bool,
    /// Tracks that received a feature vector.
    pub tracks_matched: usize,
    /// Tracks whose vector failed validation and was dropped.
    pub tracks_dropped: usize,
    /// Total tracks in the playlist.
    pub total_tracks: usize,
}

/// Batches track ids, pulls feature vectors through the catalog port and
/// merges them onto the matching tracks by id.
pub struct FeatureEnricher {
    store: Arc<dyn PlaylistStore>,
    catalog: Arc<dyn CatalogPort>,
    ttl: Duration,
}

impl FeatureEnricher {
    pub fn new(store: Arc<dyn PlaylistStore>, catalog: Arc<dyn CatalogPort>, ttl: Duration) -> Self {
        Self {
            store,
            catalog,
            ttl,
        }
    }

    /// Enrich all tracks of a playlist.
    ///
    /// No-ops when features are already fetched and the playlist is fresh.
    /// Vectors failing range validation are dropped for their track, the
    /// pass continues, and the enrichment flag is still set at the end:
    /// completion means "a pass ran", not "every track got a vector".
    pub async fn enrich(
        &self,
        playlist_id: &str,
        token: &str,
    ) -> Result<EnrichmentOutcome, SyncError> {
        let mut playlist = self
            .store
            .get(playlist_id)?
            .ok_or_else(|| SyncError::NotFound(playlist_id.to_string()))?;

        if playlist.tracks.is_empty() || !playlist.tracks_fetched {
            return Err(SyncError::InvalidState(format!(
                "playlist {} has no fetched tracks; sync tracks first",
                playlist_id
            )));
        }

        let now = Utc::now();
        let total_tracks = playlist.tracks.len();
        if playlist.audio_features_fetched && !is_stale(playlist.last_fetched_at, now, self.ttl) {
            return Ok(EnrichmentOutcome {
                skipped: true,
                tracks_matched: 0,
                tracks_dropped: 0,
                total_tracks,
            });
        }

        let track_ids: Vec<String> = playlist
            .tracks
            .iter()
            .map(|t| t.id.clone())
            .filter(|id| !id.is_empty())
            .collect();

        let remote_features = self.catalog.get_audio_features(&track_ids, token).await?;
        let lookup: HashMap<String, AudioFeatures> = remote_features
            .into_iter()
            .map(|f| (f.id.clone(), f.into()))
            .collect();

        let mut tracks_matched = 0;
        let mut tracks_dropped = 0;
        for track in &mut playlist.tracks {
            let Some(features) = lookup.get(&track.id) else {
                continue;
            };
            match validate_audio_features(features) {
                Ok(()) => {
                    track.audio_features = Some(features.clone());
                    tracks_matched += 1;
                }
                Err(e) => {
                    warn!(
                        "Dropping feature vector for track {} in playlist {}: {}",
                        track.id, playlist_id, e
                    );
                    track.audio_features = None;
                    tracks_dropped += 1;
                }
            }
        }

        playlist.audio_features_fetched = true;
        // A completed pass supersedes any earlier recorded failure.
        playlist.clear_failure(now);
        self.store.upsert(&playlist)?;

        info!(
            "Enriched playlist {}: {}/{} tracks matched, {} vectors dropped",
            playlist_id, tracks_matched, total_tracks, tracks_dropped
        );

        Ok(EnrichmentOutcome {
            skipped: false,
            tracks_matched,
            tracks_dropped,
            total_tracks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist_store::SqlitePlaylistStore;
    use crate::sync::testutil::{remote_features, remote_playlist, remote_track, FakeCatalog};
    use crate::sync::TrackSynchronizer;
    use std::sync::atomic::Ordering;

    const TTL: Duration = Duration::from_secs(3600);

    struct Fixture {
        catalog: Arc<FakeCatalog>,
        store: Arc<SqlitePlaylistStore>,
        enricher: FeatureEnricher,
    }

    /// Store with one playlist "p1" whose tracks are already synced.
    async fn synced_fixture(tracks: Vec<crate::catalog::RemoteTrack>) -> Fixture {
        let catalog = Arc::new(FakeCatalog::default());
        catalog.add_playlist(remote_playlist("p1", "Mix", tracks.len()));
        catalog.set_tracks("p1", tracks);

        let store = Arc::new(SqlitePlaylistStore::in_memory().unwrap());
        let synchronizer = TrackSynchronizer::new(store.clone(), catalog.clone(), TTL);
        synchronizer
            .sync_playlists("user1", "token", false)
            .await
            .unwrap();
        synchronizer
            .sync_tracks("p1", "token", false)
            .await
            .unwrap();

        let enricher = FeatureEnricher::new(store.clone(), catalog.clone(), TTL);
        Fixture {
            catalog,
            store,
            enricher,
        }
    }

    #[tokio::test]
    async fn test_enrich_attaches_vectors_by_id() {
        let fixture = synced_fixture(vec![
            remote_track("t1", "One", "Artist", 1000, 50),
            remote_track("t2", "Two", "Artist", 2000, 60),
        ])
        .await;
        fixture.catalog.add_features(remote_features("t1", 0.8, 0.9));

        let outcome = fixture.enricher.enrich("p1", "token").await.unwrap();

        assert!(!outcome.skipped);
        assert_eq!(outcome.tracks_matched, 1);
        assert_eq!(outcome.total_tracks, 2);

        let stored = fixture.store.get("p1").unwrap().unwrap();
        assert!(stored.audio_features_fetched);
        let track = stored.tracks.iter().find(|t| t.id == "t1").unwrap();
        assert_eq!(track.audio_features.as_ref().unwrap().energy, 0.8);
        let unmatched = stored.tracks.iter().find(|t| t.id == "t2").unwrap();
        assert!(unmatched.audio_features.is_none());
    }

    #[tokio::test]
    async fn test_enrich_without_tracks_is_invalid_state() {
        let catalog = Arc::new(FakeCatalog::default());
        catalog.add_playlist(remote_playlist("p1", "Mix", 1));
        let store = Arc::new(SqlitePlaylistStore::in_memory().unwrap());
        let synchronizer = TrackSynchronizer::new(store.clone(), catalog.clone(), TTL);
        synchronizer
            .sync_playlists("user1", "token", false)
            .await
            .unwrap();

        // Playlist exists but tracks were never synced.
        let enricher = FeatureEnricher::new(store, catalog, TTL);
        let err = enricher.enrich("p1", "token").await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_enrich_missing_playlist_is_not_found() {
        let catalog = Arc::new(FakeCatalog::default());
        let store = Arc::new(SqlitePlaylistStore::in_memory().unwrap());
        let enricher = FeatureEnricher::new(store, catalog, TTL);

        let err = enricher.enrich("missing", "token").await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_enrich_is_idempotent_when_fresh() {
        let fixture = synced_fixture(vec![remote_track("t1", "One", "Artist", 1000, 50)]).await;
        fixture.catalog.add_features(remote_features("t1", 0.5, 0.5));

        let first = fixture.enricher.enrich("p1", "token").await.unwrap();
        assert!(!first.skipped);
        let after_first = fixture.store.get("p1").unwrap().unwrap();

        let second = fixture.enricher.enrich("p1", "token").await.unwrap();
        assert!(second.skipped);
        let after_second = fixture.store.get("p1").unwrap().unwrap();

        assert_eq!(after_first.tracks, after_second.tracks);
        assert_eq!(fixture.catalog.get_features_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_enrich_drops_invalid_vector_and_continues() {
        let fixture = synced_fixture(vec![
            remote_track("t1", "One", "Artist", 1000, 50),
            remote_track("t2", "Two", "Artist", 2000, 60),
        ])
        .await;
        let mut bad = remote_features("t1", 0.5, 0.5);
        bad.loudness = 3.0; // above the 0 dBFS ceiling
        fixture.catalog.add_features(bad);
        fixture.catalog.add_features(remote_features("t2", 0.4, 0.6));

        let outcome = fixture.enricher.enrich("p1", "token").await.unwrap();

        assert_eq!(outcome.tracks_matched, 1);
        assert_eq!(outcome.tracks_dropped, 1);

        let stored = fixture.store.get("p1").unwrap().unwrap();
        // The pass still completes and flips the flag.
        assert!(stored.audio_features_fetched);
        assert!(stored
            .tracks
            .iter()
            .find(|t| t.id == "t1")
            .unwrap()
            .audio_features
            .is_none());
        assert!(stored
            .tracks
            .iter()
            .find(|t| t.id == "t2")
            .unwrap()
            .audio_features
            .is_some());
    }

    #[tokio::test]
    async fn test_enrich_upstream_failure_propagates() {
        let fixture = synced_fixture(vec![remote_track("t1", "One", "Artist", 1000, 50)]).await;
        fixture.catalog.fail_features.store(true, Ordering::SeqCst);

        let err = fixture.enricher.enrich("p1", "token").await.unwrap_err();
        assert!(matches!(err, SyncError::Upstream(_)));

        // Nothing was persisted as enriched.
        let stored = fixture.store.get("p1").unwrap().unwrap();
        assert!(!stored.audio_features_fetched);
    }
}
