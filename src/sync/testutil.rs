//! Shared test doubles for the pipeline tests.

use crate::catalog::{
    CatalogError, CatalogPort, RemoteAlbum, RemoteArtist, RemoteAudioFeatures, RemoteOwner,
    RemotePlaylist, RemoteTrack, RemoteTrackRef,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory catalog with canned data and call counters.
#[derive(Default)]
pub struct FakeCatalog {
    playlists: Mutex<Vec<RemotePlaylist>>,
    tracks: Mutex<HashMap<String, Vec<RemoteTrack>>>,
    features: Mutex<HashMap<String, RemoteAudioFeatures>>,
    pub fail_features: AtomicBool,
    pub list_playlists_calls: AtomicUsize,
    pub list_tracks_calls: AtomicUsize,
    pub get_features_calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn add_playlist(&self, playlist: RemotePlaylist) {
        self.playlists.lock().unwrap().push(playlist);
    }

    pub fn rename_playlist(&self, id: &str, name: &str) {
        let mut playlists = self.playlists.lock().unwrap();
        if let Some(playlist) = playlists.iter_mut().find(|p| p.id == id) {
            playlist.name = name.to_string();
        }
    }

    pub fn set_tracks(&self, playlist_id: &str, tracks: Vec<RemoteTrack>) {
        self.tracks
            .lock()
            .unwrap()
            .insert(playlist_id.to_string(), tracks);
    }

    pub fn add_features(&self, features: RemoteAudioFeatures) {
        self.features
            .lock()
            .unwrap()
            .insert(features.id.clone(), features);
    }
}

#[async_trait]
impl CatalogPort for FakeCatalog {
    async fn list_playlists(&self, _token: &str) -> Result<Vec<RemotePlaylist>, CatalogError> {
        self.list_playlists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.playlists.lock().unwrap().clone())
    }

    async fn list_tracks(
        &self,
        playlist_id: &str,
        _token: &str,
    ) -> Result<Vec<RemoteTrack>, CatalogError> {
        self.list_tracks_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .tracks
            .lock()
            .unwrap()
            .get(playlist_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_audio_features(
        &self,
        track_ids: &[String],
        _token: &str,
    ) -> Result<Vec<RemoteAudioFeatures>, CatalogError> {
        self.get_features_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_features.load(Ordering::SeqCst) {
            return Err(CatalogError::Status { status: 502 });
        }
        let features = self.features.lock().unwrap();
        Ok(track_ids
            .iter()
            .filter_map(|id| features.get(id).cloned())
            .collect())
    }
}

pub fn remote_playlist(id: &str, name: &str, track_total: usize) -> RemotePlaylist {
    RemotePlaylist {
        id: id.to_string(),
        name: name.to_string(),
        description: Some(format!("{} description", name)),
        public: Some(true),
        collaborative: false,
        owner: RemoteOwner {
            id: "owner1".to_string(),
            display_name: Some("Owner".to_string()),
        },
        images: None,
        external_urls: HashMap::new(),
        snapshot_id: format!("snap-{}", id),
        tracks: RemoteTrackRef { total: track_total },
    }
}

pub fn remote_track(
    id: &str,
    name: &str,
    artist: &str,
    duration_ms: u64,
    popularity: u32,
) -> RemoteTrack {
    RemoteTrack {
        id: Some(id.to_string()),
        name: name.to_string(),
        artists: vec![RemoteArtist {
            id: Some(format!("artist-{}", artist)),
            name: artist.to_string(),
        }],
        album: RemoteAlbum {
            id: Some("album1".to_string()),
            name: "Album".to_string(),
            release_date: None,
        },
        duration_ms,
        popularity,
        preview_url: None,
        external_urls: HashMap::new(),
    }
}

pub fn remote_features(id: &str, energy: f64, valence: f64) -> RemoteAudioFeatures {
    RemoteAudioFeatures {
        id: id.to_string(),
        acousticness: 0.2,
        danceability: 0.5,
        energy,
        instrumentalness: 0.0,
        liveness: 0.15,
        loudness: -8.0,
        speechiness: 0.04,
        valence,
        tempo: 120.0,
        key: 5,
        mode: 1,
        time_signature: 4,
    }
}
