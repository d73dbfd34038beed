//! SQLite implementation of the playlist store.
//!
//! Playlists are persisted as whole JSON documents, so every write is a
//! read-modify-write replace of the full row. Last writer wins at document
//! granularity; callers needing stronger guarantees must coordinate above
//! this layer (the orchestrator's per-playlist guard does exactly that).

use super::schema::{PLAYLIST_SCHEMA_SQL, PLAYLIST_SCHEMA_VERSION};
use super::{Playlist, PlaylistStore};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct SqlitePlaylistStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePlaylistStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let conn = Connection::open(path).context("Failed to open playlist database")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        if is_new_db {
            info!("Creating new playlist database at {:?}", path);
            conn.execute_batch(PLAYLIST_SCHEMA_SQL)?;
            conn.pragma_update(None, "user_version", PLAYLIST_SCHEMA_VERSION)?;
        } else {
            let db_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
            if db_version != PLAYLIST_SCHEMA_VERSION {
                anyhow::bail!(
                    "Playlist database version {} does not match expected version {}",
                    db_version,
                    PLAYLIST_SCHEMA_VERSION
                );
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store, for tests and throwaway runs.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        conn.execute_batch(PLAYLIST_SCHEMA_SQL)?;
        conn.pragma_update(None, "user_version", PLAYLIST_SCHEMA_VERSION)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl PlaylistStore for SqlitePlaylistStore {
    fn get(&self, id: &str) -> Result<Option<Playlist>> {
        let conn = self.conn.lock().unwrap();
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM playlists WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query playlist")?;

        match document {
            Some(json) => {
                let playlist =
                    serde_json::from_str(&json).context("Failed to parse playlist document")?;
                Ok(Some(playlist))
            }
            None => Ok(None),
        }
    }

    fn list_by_owner(&self, user_id: &str) -> Result<Vec<Playlist>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT document FROM playlists WHERE user_id = ?1 ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;

        let mut playlists = Vec::new();
        for row in rows {
            let json = row?;
            let playlist: Playlist =
                serde_json::from_str(&json).context("Failed to parse playlist document")?;
            playlists.push(playlist);
        }
        Ok(playlists)
    }

    fn upsert(&self, playlist: &Playlist) -> Result<()> {
        let document =
            serde_json::to_string(playlist).context("Failed to serialize playlist document")?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO playlists (id, user_id, document, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 user_id = excluded.user_id,
                 document = excluded.document,
                 updated_at = excluded.updated_at",
            params![
                playlist.id,
                playlist.user_id,
                document,
                playlist.updated_at.timestamp()
            ],
        )
        .context("Failed to upsert playlist")?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn
            .execute("DELETE FROM playlists WHERE id = ?1", params![id])
            .context("Failed to delete playlist")?;
        Ok(deleted > 0)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM playlists", [], |row| row.get(0))
            .context("Failed to count playlists")?;
        Ok(count as usize)
    }
}
