//! Access to the external music catalog.
//!
//! [`CatalogPort`] is the fetch contract the sync pipeline depends on:
//! paginated playlist and track listings plus a batched feature-vector
//! lookup. [`HttpCatalogClient`] is the reqwest implementation; retry with
//! bounded exponential backoff lives in the adapter, never in the pipeline.

mod client;
mod models;
mod retry;

pub use client::{CatalogClientConfig, HttpCatalogClient};
pub use models::{
    Page, RemoteAlbum, RemoteArtist, RemoteAudioFeatures, RemoteAudioFeaturesResponse, RemoteImage,
    RemoteOwner, RemotePlaylist, RemotePlaylistEntry, RemoteTrack, RemoteTrackRef,
};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from catalog calls.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Catalog rejected the credential")]
    Unauthorized,

    #[error("Rate limited by the catalog (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Catalog returned status {status}")]
    Status { status: u16 },

    #[error("Failed to decode catalog response: {0}")]
    Decode(String),
}

impl CatalogError {
    /// Whether a retry could plausibly succeed. Auth failures and malformed
    /// payloads never get retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Transport(e) => !e.is_builder(),
            CatalogError::RateLimited { .. } => true,
            CatalogError::Status { status } => *status >= 500,
            CatalogError::Unauthorized | CatalogError::Decode(_) => false,
        }
    }
}

/// Fetch contract against the external catalog.
///
/// Implementations own pagination, batching limits, timeouts and retry;
/// the pipeline only sees complete result sets.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait CatalogPort: Send + Sync {
    /// List all playlists owned by the authenticated identity.
    async fn list_playlists(&self, token: &str) -> Result<Vec<RemotePlaylist>, CatalogError>;

    /// List the full track set of a playlist.
    async fn list_tracks(
        &self,
        playlist_id: &str,
        token: &str,
    ) -> Result<Vec<RemoteTrack>, CatalogError>;

    /// Look up feature vectors for a batch of track ids. Ids without a
    /// known vector are simply absent from the result.
    async fn get_audio_features(
        &self,
        track_ids: &[String],
        token: &str,
    ) -> Result<Vec<RemoteAudioFeatures>, CatalogError>;
}
