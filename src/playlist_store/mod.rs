//! Durable storage for cached playlist documents.
//!
//! The [`PlaylistStore`] trait is the repository contract the sync pipeline
//! depends on: load by external id, list by owning user, whole-document
//! upsert, delete. [`SqlitePlaylistStore`] is the default implementation.

mod models;
mod schema;
mod sqlite_store;
pub mod validation;

pub use models::{
    AnalysisStatus, ArtistCount, AudioFeatures, Playlist, PlaylistAnalysis, PlaylistImage,
    PlaylistOwner, Track, TrackAlbum, TrackArtist,
};
pub use sqlite_store::SqlitePlaylistStore;
pub use validation::{validate_audio_features, validate_track, ValidationError};

use anyhow::Result;

/// Repository contract for playlist documents.
///
/// All mutations are whole-document replaces; there is no partial update.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait PlaylistStore: Send + Sync {
    /// Load a playlist by its external catalog id.
    fn get(&self, id: &str) -> Result<Option<Playlist>>;

    /// List all playlists cached for an internal user account.
    fn list_by_owner(&self, user_id: &str) -> Result<Vec<Playlist>>;

    /// Insert or replace a playlist document.
    fn upsert(&self, playlist: &Playlist) -> Result<()>;

    /// Delete a playlist. Returns false when it did not exist.
    fn delete(&self, id: &str) -> Result<bool>;

    /// Number of playlist documents in the store, across all users.
    fn count(&self) -> Result<usize>;
}
