//! Database schema for the playlist store.
//!
//! One row per playlist. The playlist itself is stored as a JSON document
//! (`document` column) so every mutation is a whole-document replace; the
//! indexed columns exist only for lookups.

/// Current schema version, written to `PRAGMA user_version`.
pub const PLAYLIST_SCHEMA_VERSION: i64 = 1;

/// SQL schema for the playlist database (version 1).
pub const PLAYLIST_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS playlists (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    document TEXT NOT NULL,

    -- Unix seconds, mirrors document.updated_at for cheap queries
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_playlists_user_id ON playlists(user_id);
"#;
