use anyhow::Result;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{info, warn};

use crate::catalog::CatalogPort;
use crate::playlist_store::PlaylistStore;
use crate::sync::{StartOutcome, SyncError, SyncOrchestrator, SyncSettings};
use tokio_util::sync::CancellationToken;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{log_requests, metrics, state::*, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct ListPlaylistsParams {
    pub user_id: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Deserialize, Debug)]
struct SyncTracksParams {
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Serialize)]
struct StartResponse {
    status: &'static str,
}

/// Pull the pass-through catalog credential out of the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Result<String, Response> {
    let unauthorized = || {
        (
            StatusCode::UNAUTHORIZED,
            "Missing or malformed Authorization header",
        )
            .into_response()
    };

    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(unauthorized)?;
    let value = value.to_str().map_err(|_| unauthorized())?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(unauthorized()),
    }
}

fn error_response(err: SyncError, endpoint: &str) -> Response {
    let (status, error_type) = match &err {
        SyncError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        SyncError::InvalidState(_) => (StatusCode::BAD_REQUEST, "invalid_state"),
        SyncError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream"),
        SyncError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
        SyncError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store"),
    };
    warn!("Request to {} failed: {}", endpoint, err);
    metrics::record_error(error_type, endpoint);
    (status, err.to_string()).into_response()
}

fn start_response(outcome: StartOutcome, operation: &str) -> Response {
    match outcome {
        StartOutcome::Started => {
            metrics::record_sync_operation(operation, "started");
            (StatusCode::ACCEPTED, Json(StartResponse { status: "started" })).into_response()
        }
        StartOutcome::AlreadyRunning => {
            metrics::record_sync_operation(operation, "already_running");
            (
                StatusCode::CONFLICT,
                Json(StartResponse {
                    status: "already_running",
                }),
            )
                .into_response()
        }
    }
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    };
    Json(stats)
}

async fn list_playlists(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(params): Query<ListPlaylistsParams>,
) -> Response {
    let token = match bearer_token(&headers) {
        Ok(token) => token,
        Err(response) => return response,
    };
    let user_id = params
        .user_id
        .unwrap_or_else(|| state.config.default_user_id.clone());

    match state
        .orchestrator
        .sync_playlists(&user_id, &token, params.refresh)
        .await
    {
        Ok(playlists) => {
            metrics::record_sync_operation("sync_playlists", "ok");
            match state.playlist_store.count() {
                Ok(count) => metrics::set_playlists_cached(count),
                Err(err) => warn!("Could not refresh cached playlist gauge: {}", err),
            }
            Json(playlists).into_response()
        }
        Err(err) => error_response(err, "/api/playlists"),
    }
}

async fn get_playlist(
    State(store): State<GuardedPlaylistStore>,
    Path(id): Path<String>,
) -> Response {
    match store.get(&id) {
        Ok(Some(playlist)) => Json(playlist).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => error_response(err.into(), "/api/playlists/{id}"),
    }
}

async fn get_playlist_tracks(
    State(orchestrator): State<GuardedOrchestrator>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<SyncTracksParams>,
) -> Response {
    let token = match bearer_token(&headers) {
        Ok(token) => token,
        Err(response) => return response,
    };

    match orchestrator
        .sync_tracks(&id, &token, params.force_refresh)
        .await
    {
        Ok(tracks) => {
            metrics::record_sync_operation("sync_tracks", "ok");
            Json(tracks).into_response()
        }
        Err(err) => error_response(err, "/api/playlists/{id}/tracks"),
    }
}

async fn post_audio_features(
    State(orchestrator): State<GuardedOrchestrator>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let token = match bearer_token(&headers) {
        Ok(token) => token,
        Err(response) => return response,
    };

    match orchestrator.start_enrichment(&id, &token) {
        Ok(outcome) => start_response(outcome, "enrich"),
        Err(err) => error_response(err, "/api/playlists/{id}/audio-features"),
    }
}

async fn post_analyze(
    State(orchestrator): State<GuardedOrchestrator>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let token = match bearer_token(&headers) {
        Ok(token) => token,
        Err(response) => return response,
    };

    match orchestrator.start_analysis(&id, &token) {
        Ok(outcome) => start_response(outcome, "analyze"),
        Err(err) => error_response(err, "/api/playlists/{id}/analyze"),
    }
}

async fn get_status(
    State(orchestrator): State<GuardedOrchestrator>,
    Path(id): Path<String>,
) -> Response {
    match orchestrator.status(&id) {
        Ok(status) => Json(status).into_response(),
        Err(err) => error_response(err, "/api/playlists/{id}/status"),
    }
}

async fn get_analysis(
    State(store): State<GuardedPlaylistStore>,
    Path(id): Path<String>,
) -> Response {
    match store.get(&id) {
        Ok(Some(playlist)) => match playlist.analysis {
            Some(analysis) => Json(analysis).into_response(),
            None => (
                StatusCode::NOT_FOUND,
                format!("Playlist {} has not been analyzed", id),
            )
                .into_response(),
        },
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => error_response(err.into(), "/api/playlists/{id}/analysis"),
    }
}

async fn delete_playlist(
    State(orchestrator): State<GuardedOrchestrator>,
    Path(id): Path<String>,
) -> Response {
    match orchestrator.delete_playlist(&id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => error_response(err, "/api/playlists/{id}"),
    }
}

fn make_app(
    config: ServerConfig,
    playlist_store: Arc<dyn PlaylistStore>,
    catalog: Arc<dyn CatalogPort>,
    settings: SyncSettings,
    shutdown: CancellationToken,
) -> Router {
    let orchestrator = Arc::new(SyncOrchestrator::new(
        playlist_store.clone(),
        catalog,
        settings,
        shutdown,
    ));
    let state = ServerState {
        config,
        start_time: Instant::now(),
        playlist_store,
        orchestrator,
        hash: env!("GIT_HASH").to_owned(),
    };

    let playlist_routes: Router = Router::new()
        .route("/playlists", get(list_playlists))
        .route("/playlists/{id}", get(get_playlist))
        .route("/playlists/{id}", delete(delete_playlist))
        .route("/playlists/{id}/tracks", get(get_playlist_tracks))
        .route("/playlists/{id}/audio-features", post(post_audio_features))
        .route("/playlists/{id}/analyze", post(post_analyze))
        .route("/playlists/{id}/status", get(get_status))
        .route("/playlists/{id}/analysis", get(get_analysis))
        .with_state(state.clone());

    Router::new()
        .route("/", get(home))
        .route("/metrics", get(metrics::metrics_handler))
        .with_state(state.clone())
        .nest("/api", playlist_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub async fn run_server(
    config: ServerConfig,
    playlist_store: Arc<dyn PlaylistStore>,
    catalog: Arc<dyn CatalogPort>,
    settings: SyncSettings,
    shutdown: CancellationToken,
) -> Result<()> {
    metrics::init_metrics();
    let port = config.port;
    let app = make_app(config, playlist_store, catalog, settings, shutdown.clone());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Listening on port {}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}
