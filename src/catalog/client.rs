//! HTTP client for the external catalog API.

use super::models::{
    Page, RemoteAudioFeatures, RemoteAudioFeaturesResponse, RemotePlaylist, RemotePlaylistEntry,
    RemoteTrack,
};
use super::{CatalogError, CatalogPort, RetryPolicy};
use crate::server::metrics::record_catalog_request;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the catalog client.
#[derive(Debug, Clone)]
pub struct CatalogClientConfig {
    /// Base URL of the catalog API (e.g., "https://api.spotify.com/v1").
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Page size for paginated listings. The provider caps this at 50.
    pub page_size: usize,
    /// Maximum ids per batched feature lookup. The provider caps this at 100.
    pub features_batch_size: usize,
    /// Retry policy for retryable failures.
    pub retry: RetryPolicy,
}

impl Default for CatalogClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.spotify.com/v1".to_string(),
            timeout_secs: 30,
            page_size: 50,
            features_batch_size: 100,
            retry: RetryPolicy::default(),
        }
    }
}

/// reqwest-backed implementation of [`CatalogPort`].
pub struct HttpCatalogClient {
    client: reqwest::Client,
    config: CatalogClientConfig,
}

impl HttpCatalogClient {
    pub fn new(mut config: CatalogClientConfig) -> Result<Self, CatalogError> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// GET a JSON resource, retrying retryable failures with backoff.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
    ) -> Result<T, CatalogError> {
        let mut retry_count = 0;
        loop {
            match self.try_get_json::<T>(url, token).await {
                Ok(value) => return Ok(value),
                Err(error) if self.config.retry.should_retry(&error, retry_count) => {
                    let backoff = self.config.retry.backoff(&error, retry_count);
                    warn!(
                        "Catalog call to {} failed ({}), retry {} in {:?}",
                        url,
                        error,
                        retry_count + 1,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    retry_count += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn try_get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
    ) -> Result<T, CatalogError> {
        let response = self.client.get(url).bearer_auth(token).send().await?;
        let status = response.status();

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(CatalogError::Unauthorized);
        }
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(CatalogError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                CatalogError::Decode(e.to_string())
            } else {
                CatalogError::Transport(e)
            }
        })
    }

    /// Walk a paginated listing from offset 0 until the provider reports no
    /// further page.
    async fn collect_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<Vec<T>, CatalogError> {
        let limit = self.config.page_size;
        let mut offset = 0;
        let mut items = Vec::new();

        loop {
            let url = format!(
                "{}{}?limit={}&offset={}",
                self.config.base_url, path, limit, offset
            );
            let page: Page<T> = self.get_json(&url, token).await?;
            let fetched = page.items.len();
            items.extend(page.items);

            debug!(
                "Fetched {} items from {} (offset {}, total {})",
                fetched, path, offset, page.total
            );

            offset += limit;
            if fetched < limit || page.next.is_none() {
                break;
            }
        }

        Ok(items)
    }

    async fn fetch_feature_batches(
        &self,
        track_ids: &[String],
        token: &str,
    ) -> Result<Vec<RemoteAudioFeatures>, CatalogError> {
        let mut features = Vec::with_capacity(track_ids.len());

        for chunk in track_ids.chunks(self.config.features_batch_size) {
            let url = format!(
                "{}/audio-features?ids={}",
                self.config.base_url,
                chunk.join(",")
            );
            let response: RemoteAudioFeaturesResponse = self.get_json(&url, token).await?;
            features.extend(response.audio_features.into_iter().flatten());
        }

        Ok(features)
    }
}

fn outcome_label<T>(result: &Result<T, CatalogError>) -> &'static str {
    if result.is_ok() {
        "ok"
    } else {
        "error"
    }
}

#[async_trait]
impl CatalogPort for HttpCatalogClient {
    async fn list_playlists(&self, token: &str) -> Result<Vec<RemotePlaylist>, CatalogError> {
        let result = self.collect_pages("/me/playlists", token).await;
        record_catalog_request("playlists", outcome_label(&result));
        result
    }

    async fn list_tracks(
        &self,
        playlist_id: &str,
        token: &str,
    ) -> Result<Vec<RemoteTrack>, CatalogError> {
        let path = format!("/playlists/{}/tracks", playlist_id);
        let result: Result<Vec<RemotePlaylistEntry>, _> = self.collect_pages(&path, token).await;
        record_catalog_request("tracks", outcome_label(&result));
        let entries = result?;
        Ok(entries.into_iter().filter_map(|e| e.track).collect())
    }

    async fn get_audio_features(
        &self,
        track_ids: &[String],
        token: &str,
    ) -> Result<Vec<RemoteAudioFeatures>, CatalogError> {
        let result = self.fetch_feature_batches(track_ids, token).await;
        record_catalog_request("audio_features", outcome_label(&result));
        result
    }
}
