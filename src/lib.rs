//! Tasteprint Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod catalog;
pub mod config;
pub mod playlist_store;
pub mod server;
pub mod sync;

// Re-export commonly used types for convenience
pub use catalog::{CatalogPort, HttpCatalogClient};
pub use config::{AppConfig, CliConfig};
pub use playlist_store::{PlaylistStore, SqlitePlaylistStore};
pub use server::{run_server, RequestsLoggingLevel, ServerConfig};
pub use sync::{SyncOrchestrator, SyncSettings};
