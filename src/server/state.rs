use axum::extract::FromRef;

use crate::playlist_store::PlaylistStore;
use crate::sync::SyncOrchestrator;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedPlaylistStore = Arc<dyn PlaylistStore>;
pub type GuardedOrchestrator = Arc<SyncOrchestrator>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub playlist_store: GuardedPlaylistStore,
    pub orchestrator: GuardedOrchestrator,
    pub hash: String,
}

impl FromRef<ServerState> for GuardedPlaylistStore {
    fn from_ref(input: &ServerState) -> Self {
        input.playlist_store.clone()
    }
}

impl FromRef<ServerState> for GuardedOrchestrator {
    fn from_ref(input: &ServerState) -> Self {
        input.orchestrator.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
