//! Wire types for the external music catalog API.
//!
//! Only the fields the pipeline consumes are modeled; everything else in
//! the provider's payloads is ignored by serde. Conversion into the typed
//! store entities happens here, at the boundary.

use crate::playlist_store::{AudioFeatures, Track, TrackAlbum, TrackArtist};
use serde::Deserialize;
use std::collections::HashMap;

/// One page of a paginated listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteOwner {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteImage {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Track counter embedded in a playlist listing entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTrackRef {
    #[serde(default)]
    pub total: usize,
}

/// A playlist as returned by the playlist listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePlaylist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(default)]
    pub collaborative: bool,
    pub owner: RemoteOwner,
    #[serde(default)]
    pub images: Option<Vec<RemoteImage>>,
    #[serde(default)]
    pub external_urls: HashMap<String, String>,
    pub snapshot_id: String,
    pub tracks: RemoteTrackRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteArtist {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteAlbum {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub release_date: Option<String>,
}

/// A track as returned by the playlist tracks endpoint.
///
/// Local files and removed tracks come back without an id.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTrack {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<RemoteArtist>,
    pub album: RemoteAlbum,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub external_urls: HashMap<String, String>,
}

/// Entry wrapper of the playlist tracks endpoint; `track` is null for
/// entries the provider can no longer resolve.
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePlaylistEntry {
    #[serde(default)]
    pub track: Option<RemoteTrack>,
}

/// A feature vector as returned by the batched features endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteAudioFeatures {
    pub id: String,
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

/// Batched features response; unknown ids come back as nulls.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteAudioFeaturesResponse {
    #[serde(default = "Vec::new")]
    pub audio_features: Vec<Option<RemoteAudioFeatures>>,
}

impl RemoteTrack {
    /// Convert into a store track. Returns `None` when the provider did not
    /// supply an id (such tracks cannot be enriched or deduplicated).
    pub fn into_track(self) -> Option<Track> {
        let id = self.id?;
        Some(Track {
            id,
            name: self.name,
            artists: self
                .artists
                .into_iter()
                .map(|a| TrackArtist {
                    id: a.id.unwrap_or_default(),
                    name: a.name,
                })
                .collect(),
            album: TrackAlbum {
                id: self.album.id.unwrap_or_default(),
                name: self.album.name,
                release_date: self.album.release_date,
            },
            duration_ms: self.duration_ms,
            popularity: self.popularity,
            preview_url: self.preview_url,
            external_urls: self.external_urls,
            audio_features: None,
        })
    }
}

impl From<RemoteAudioFeatures> for AudioFeatures {
    fn from(remote: RemoteAudioFeatures) -> Self {
        AudioFeatures {
            acousticness: remote.acousticness,
            danceability: remote.danceability,
            energy: remote.energy,
            instrumentalness: remote.instrumentalness,
            liveness: remote.liveness,
            loudness: remote.loudness,
            speechiness: remote.speechiness,
            valence: remote.valence,
            tempo: remote.tempo,
            key: remote.key,
            mode: remote.mode,
            time_signature: remote.time_signature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_without_id_converts_to_none() {
        let remote = RemoteTrack {
            id: None,
            name: "Local file".to_string(),
            artists: vec![],
            album: RemoteAlbum {
                id: None,
                name: "Unknown".to_string(),
                release_date: None,
            },
            duration_ms: 1000,
            popularity: 0,
            preview_url: None,
            external_urls: HashMap::new(),
        };
        assert!(remote.into_track().is_none());
    }

    #[test]
    fn test_playlist_page_parses_provider_payload() {
        let json = r#"{
            "items": [{
                "id": "pl1",
                "name": "Mix",
                "description": "desc",
                "public": true,
                "collaborative": false,
                "owner": {"id": "u1", "display_name": "User"},
                "images": [{"url": "http://img", "width": 640, "height": 640}],
                "external_urls": {"spotify": "http://open"},
                "snapshot_id": "snap",
                "tracks": {"total": 12},
                "unmodeled_field": {"nested": true}
            }],
            "total": 1,
            "limit": 50,
            "offset": 0,
            "next": null
        }"#;

        let page: Page<RemotePlaylist> = serde_json::from_str(json).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "pl1");
        assert_eq!(page.items[0].tracks.total, 12);
        assert!(page.next.is_none());
    }

    #[test]
    fn test_features_response_keeps_null_slots() {
        let json = r#"{"audio_features": [null, {
            "id": "t1",
            "acousticness": 0.1, "danceability": 0.2, "energy": 0.3,
            "instrumentalness": 0.0, "liveness": 0.1, "loudness": -9.0,
            "speechiness": 0.05, "valence": 0.7, "tempo": 120.0,
            "key": 5, "mode": 1, "time_signature": 4
        }]}"#;

        let response: RemoteAudioFeaturesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.audio_features.len(), 2);
        assert!(response.audio_features[0].is_none());
        assert_eq!(response.audio_features[1].as_ref().unwrap().id, "t1");
    }
}
