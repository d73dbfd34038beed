//! Track synchronizer: reconciles cached playlists against the catalog.

use super::staleness::is_stale;
use super::SyncError;
use crate::catalog::{CatalogPort, RemotePlaylist};
use crate::playlist_store::{
    validate_track, Playlist, PlaylistImage, PlaylistOwner, PlaylistStore, Track,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pulls playlist metadata and track lists through the catalog port and
/// reconciles them against stored state.
pub struct TrackSynchronizer {
    store: Arc<dyn PlaylistStore>,
    catalog: Arc<dyn CatalogPort>,
    ttl: Duration,
}

impl TrackSynchronizer {
    pub fn new(store: Arc<dyn PlaylistStore>, catalog: Arc<dyn CatalogPort>, ttl: Duration) -> Self {
        Self {
            store,
            catalog,
            ttl,
        }
    }

    /// Sync the playlist set of a user.
    ///
    /// Returns the cached set untouched when it is non-empty and fresh,
    /// unless `force_refresh` is set. Upstream playlists are merge-updated
    /// into existing documents; track and analysis state is preserved.
    /// Playlists that disappeared upstream are never deleted here.
    pub async fn sync_playlists(
        &self,
        user_id: &str,
        token: &str,
        force_refresh: bool,
    ) -> Result<Vec<Playlist>, SyncError> {
        let now = Utc::now();

        if !force_refresh {
            let cached = self.store.list_by_owner(user_id)?;
            let newest = cached.iter().map(|p| p.updated_at).max();
            if !cached.is_empty() && !is_stale(newest, now, self.ttl) {
                debug!(
                    "Returning {} cached playlists for user {}",
                    cached.len(),
                    user_id
                );
                return Ok(cached);
            }
        }

        let remote_playlists = self.catalog.list_playlists(token).await?;
        let mut synced = Vec::new();

        for remote in remote_playlists {
            // Empty playlists carry nothing to analyze; skip them outright.
            if remote.tracks.total == 0 {
                continue;
            }

            let playlist = match self.store.get(&remote.id)? {
                Some(mut existing) => {
                    merge_remote_playlist(&mut existing, remote);
                    existing.updated_at = now;
                    existing
                }
                None => new_playlist_from_remote(remote, user_id),
            };

            self.store.upsert(&playlist)?;
            synced.push(playlist);
        }

        info!("Synced {} playlists for user {}", synced.len(), user_id);
        Ok(synced)
    }

    /// Sync the track list of a playlist.
    ///
    /// Returns the cached list when tracks are fetched and fresh, unless
    /// `force_refresh` is set. A re-fetch replaces the track list wholesale
    /// and discards any previously attached feature vectors, so the
    /// enrichment flag is reset along with it.
    pub async fn sync_tracks(
        &self,
        playlist_id: &str,
        token: &str,
        force_refresh: bool,
    ) -> Result<Vec<Track>, SyncError> {
        let mut playlist = self
            .store
            .get(playlist_id)?
            .ok_or_else(|| SyncError::NotFound(playlist_id.to_string()))?;

        let now = Utc::now();
        if !force_refresh
            && playlist.tracks_fetched
            && !is_stale(playlist.last_fetched_at, now, self.ttl)
        {
            debug!(
                "Returning {} cached tracks for playlist {}",
                playlist.tracks.len(),
                playlist_id
            );
            return Ok(playlist.tracks);
        }

        let remote_tracks = self.catalog.list_tracks(playlist_id, token).await?;

        let mut tracks = Vec::with_capacity(remote_tracks.len());
        for remote in remote_tracks {
            // Entries without an id (local files, ghosts) are dropped.
            let Some(track) = remote.into_track() else {
                continue;
            };
            if let Err(e) = validate_track(&track) {
                warn!(
                    "Dropping invalid track {} from playlist {}: {}",
                    track.id, playlist_id, e
                );
                continue;
            }
            tracks.push(track);
        }

        info!(
            "Fetched {} tracks for playlist {} from catalog",
            tracks.len(),
            playlist_id
        );

        playlist.tracks = tracks.clone();
        playlist.audio_features_fetched = false;
        playlist.mark_tracks_fetched(now);
        self.store.upsert(&playlist)?;

        Ok(tracks)
    }
}

fn merge_remote_playlist(existing: &mut Playlist, remote: RemotePlaylist) {
    existing.name = remote.name;
    existing.description = remote.description.unwrap_or_default();
    existing.track_count = remote.tracks.total;
    existing.public = remote.public.unwrap_or(existing.public);
    existing.collaborative = remote.collaborative;
    existing.images = remote_images(remote.images);
    existing.external_urls = remote.external_urls;
    existing.snapshot_id = remote.snapshot_id;
}

fn new_playlist_from_remote(remote: RemotePlaylist, user_id: &str) -> Playlist {
    let now = Utc::now();
    Playlist {
        id: remote.id,
        name: remote.name,
        description: remote.description.unwrap_or_default(),
        track_count: remote.tracks.total,
        public: remote.public.unwrap_or(false),
        collaborative: remote.collaborative,
        owner: PlaylistOwner {
            id: remote.owner.id,
            display_name: remote.owner.display_name,
        },
        user_id: user_id.to_string(),
        images: remote_images(remote.images),
        external_urls: remote.external_urls,
        snapshot_id: remote.snapshot_id,
        tracks: vec![],
        tracks_fetched: false,
        audio_features_fetched: false,
        analysis: None,
        last_error: None,
        created_at: now,
        updated_at: now,
        last_fetched_at: None,
        last_analyzed_at: None,
    }
}

fn remote_images(images: Option<Vec<crate::catalog::RemoteImage>>) -> Vec<PlaylistImage> {
    images
        .unwrap_or_default()
        .into_iter()
        .map(|i| PlaylistImage {
            url: i.url,
            width: i.width,
            height: i.height,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testutil::{remote_playlist, remote_track, FakeCatalog};
    use crate::playlist_store::SqlitePlaylistStore;
    use std::sync::atomic::Ordering;

    const TTL: Duration = Duration::from_secs(3600);

    fn make_synchronizer(catalog: Arc<FakeCatalog>) -> (TrackSynchronizer, Arc<SqlitePlaylistStore>) {
        let store = Arc::new(SqlitePlaylistStore::in_memory().unwrap());
        let synchronizer = TrackSynchronizer::new(store.clone(), catalog, TTL);
        (synchronizer, store)
    }

    #[tokio::test]
    async fn test_sync_playlists_creates_local_documents() {
        let catalog = Arc::new(FakeCatalog::default());
        catalog.add_playlist(remote_playlist("p1", "Mix one", 3));
        catalog.add_playlist(remote_playlist("p2", "Mix two", 5));
        let (synchronizer, store) = make_synchronizer(catalog.clone());

        let synced = synchronizer
            .sync_playlists("user1", "token", false)
            .await
            .unwrap();

        assert_eq!(synced.len(), 2);
        let stored = store.get("p1").unwrap().unwrap();
        assert_eq!(stored.name, "Mix one");
        assert_eq!(stored.track_count, 3);
        assert_eq!(stored.user_id, "user1");
        assert!(!stored.tracks_fetched);
    }

    #[tokio::test]
    async fn test_sync_playlists_skips_empty_playlists() {
        let catalog = Arc::new(FakeCatalog::default());
        catalog.add_playlist(remote_playlist("p1", "Mix", 2));
        catalog.add_playlist(remote_playlist("empty", "Nothing here", 0));
        let (synchronizer, store) = make_synchronizer(catalog);

        let synced = synchronizer
            .sync_playlists("user1", "token", false)
            .await
            .unwrap();

        assert_eq!(synced.len(), 1);
        assert!(store.get("empty").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sync_playlists_returns_fresh_cache_without_catalog_call() {
        let catalog = Arc::new(FakeCatalog::default());
        catalog.add_playlist(remote_playlist("p1", "Mix", 2));
        let (synchronizer, _store) = make_synchronizer(catalog.clone());

        synchronizer
            .sync_playlists("user1", "token", false)
            .await
            .unwrap();
        assert_eq!(catalog.list_playlists_calls.load(Ordering::SeqCst), 1);

        // Second call within the TTL must not touch the catalog.
        let cached = synchronizer
            .sync_playlists("user1", "token", false)
            .await
            .unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(catalog.list_playlists_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sync_playlists_force_refresh_bypasses_cache() {
        let catalog = Arc::new(FakeCatalog::default());
        catalog.add_playlist(remote_playlist("p1", "Mix", 2));
        let (synchronizer, _store) = make_synchronizer(catalog.clone());

        synchronizer
            .sync_playlists("user1", "token", false)
            .await
            .unwrap();
        synchronizer
            .sync_playlists("user1", "token", true)
            .await
            .unwrap();
        assert_eq!(catalog.list_playlists_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sync_playlists_merge_preserves_track_state() {
        let catalog = Arc::new(FakeCatalog::default());
        catalog.add_playlist(remote_playlist("p1", "Old name", 2));
        catalog.set_tracks("p1", vec![remote_track("t1", "Song", "Artist", 1000, 50)]);
        let (synchronizer, store) = make_synchronizer(catalog.clone());

        synchronizer
            .sync_playlists("user1", "token", false)
            .await
            .unwrap();
        synchronizer
            .sync_tracks("p1", "token", false)
            .await
            .unwrap();

        // Upstream rename; force a refresh and check the track list survives.
        catalog.rename_playlist("p1", "New name");
        synchronizer
            .sync_playlists("user1", "token", true)
            .await
            .unwrap();

        let stored = store.get("p1").unwrap().unwrap();
        assert_eq!(stored.name, "New name");
        assert!(stored.tracks_fetched);
        assert_eq!(stored.tracks.len(), 1);
    }

    #[tokio::test]
    async fn test_sync_tracks_unknown_playlist_is_not_found() {
        let catalog = Arc::new(FakeCatalog::default());
        let (synchronizer, _store) = make_synchronizer(catalog);

        let err = synchronizer
            .sync_tracks("missing", "token", false)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_sync_tracks_replaces_list_and_resets_enrichment() {
        let catalog = Arc::new(FakeCatalog::default());
        catalog.add_playlist(remote_playlist("p1", "Mix", 1));
        catalog.set_tracks("p1", vec![remote_track("t1", "Song", "Artist", 1000, 50)]);
        let (synchronizer, store) = make_synchronizer(catalog.clone());

        synchronizer
            .sync_playlists("user1", "token", false)
            .await
            .unwrap();
        synchronizer
            .sync_tracks("p1", "token", false)
            .await
            .unwrap();

        // Pretend a prior enrichment ran, then force a track re-fetch.
        let mut playlist = store.get("p1").unwrap().unwrap();
        playlist.audio_features_fetched = true;
        store.upsert(&playlist).unwrap();

        catalog.set_tracks(
            "p1",
            vec![
                remote_track("t2", "Other", "Artist", 2000, 60),
                remote_track("t3", "Third", "Artist", 3000, 70),
            ],
        );
        let tracks = synchronizer
            .sync_tracks("p1", "token", true)
            .await
            .unwrap();

        assert_eq!(tracks.len(), 2);
        let stored = store.get("p1").unwrap().unwrap();
        assert_eq!(stored.tracks.len(), 2);
        assert!(stored.tracks_fetched);
        assert!(!stored.audio_features_fetched);
        assert!(stored.tracks.iter().all(|t| t.audio_features.is_none()));
    }

    #[tokio::test]
    async fn test_sync_tracks_fresh_cache_skips_catalog() {
        let catalog = Arc::new(FakeCatalog::default());
        catalog.add_playlist(remote_playlist("p1", "Mix", 1));
        catalog.set_tracks("p1", vec![remote_track("t1", "Song", "Artist", 1000, 50)]);
        let (synchronizer, _store) = make_synchronizer(catalog.clone());

        synchronizer
            .sync_playlists("user1", "token", false)
            .await
            .unwrap();
        synchronizer
            .sync_tracks("p1", "token", false)
            .await
            .unwrap();
        assert_eq!(catalog.list_tracks_calls.load(Ordering::SeqCst), 1);

        let cached = synchronizer
            .sync_tracks("p1", "token", false)
            .await
            .unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(catalog.list_tracks_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sync_tracks_drops_idless_entries() {
        let catalog = Arc::new(FakeCatalog::default());
        catalog.add_playlist(remote_playlist("p1", "Mix", 2));
        let mut ghost = remote_track("t1", "Song", "Artist", 1000, 50);
        ghost.id = None;
        catalog.set_tracks(
            "p1",
            vec![ghost, remote_track("t2", "Other", "Artist", 2000, 60)],
        );
        let (synchronizer, _store) = make_synchronizer(catalog);

        let playlists = synchronizer
            .sync_playlists("user1", "token", false)
            .await
            .unwrap();
        assert_eq!(playlists.len(), 1);
        let tracks = synchronizer
            .sync_tracks("p1", "token", false)
            .await
            .unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, "t2");
    }
}
