//! The playlist synchronization and analysis pipeline.
//!
//! Stages run in a fixed order, each gated by the playlist's sync state and
//! the staleness policy, each persisting through the playlist store before
//! the next stage may run:
//!
//! ```text
//! orchestrator → synchronizer → enricher → analysis engine
//! ```
//!
//! Playlist and track listing run in the foreground; enrichment and
//! analysis are detached background tasks owned by the
//! [`SyncOrchestrator`], which also enforces the stage preconditions and
//! answers status queries.

mod analysis;
mod enricher;
mod orchestrator;
mod staleness;
mod synchronizer;
#[cfg(test)]
pub(crate) mod testutil;

pub use analysis::AnalysisEngine;
pub use enricher::{EnrichmentOutcome, FeatureEnricher};
pub use orchestrator::{
    AnalysisSummary, StartOutcome, SyncOrchestrator, SyncSettings, SyncState, SyncStatus,
};
pub use staleness::{is_stale, DEFAULT_TTL};
pub use synchronizer::TrackSynchronizer;

use crate::catalog::CatalogError;
use crate::playlist_store::ValidationError;
use thiserror::Error;

/// Errors surfaced by the pipeline stages.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Playlist not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Upstream catalog failure: {0}")]
    Upstream(#[from] CatalogError),

    #[error("Validation failure: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}
