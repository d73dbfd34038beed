mod file_config;

pub use file_config::{CatalogConfig, FileConfig, SyncConfig};

use crate::catalog::{CatalogClientConfig, RetryPolicy};
use crate::server::RequestsLoggingLevel;
use crate::sync::SyncSettings;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub default_user_id: String,
    pub cache_ttl_secs: u64,
    pub catalog_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub default_user_id: String,

    // Pipeline and adapter settings (with defaults)
    pub sync: SyncSettings,
    pub catalog: CatalogClientConfig,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        // Validate db_dir exists
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let default_user_id = file
            .default_user_id
            .unwrap_or_else(|| cli.default_user_id.clone());

        // Pipeline settings - merge file config with defaults
        let sync_file = file.sync.unwrap_or_default();
        let sync_defaults = SyncSettings::default();
        let sync = SyncSettings {
            ttl_secs: sync_file.cache_ttl_secs.unwrap_or(cli.cache_ttl_secs),
            seed_track_count: sync_file
                .seed_track_count
                .unwrap_or(sync_defaults.seed_track_count),
            top_artists_limit: sync_file
                .top_artists_limit
                .unwrap_or(sync_defaults.top_artists_limit),
        };

        // Catalog adapter settings
        let catalog_file = file.catalog.unwrap_or_default();
        let catalog_defaults = CatalogClientConfig::default();
        let retry_defaults = RetryPolicy::default();
        let catalog = CatalogClientConfig {
            base_url: catalog_file
                .base_url
                .or_else(|| cli.catalog_base_url.clone())
                .unwrap_or(catalog_defaults.base_url),
            timeout_secs: catalog_file
                .timeout_secs
                .unwrap_or(catalog_defaults.timeout_secs),
            page_size: catalog_file.page_size.unwrap_or(catalog_defaults.page_size),
            features_batch_size: catalog_file
                .features_batch_size
                .unwrap_or(catalog_defaults.features_batch_size),
            retry: RetryPolicy {
                max_retries: catalog_file
                    .max_retries
                    .unwrap_or(retry_defaults.max_retries),
                initial_backoff_ms: catalog_file
                    .initial_backoff_ms
                    .unwrap_or(retry_defaults.initial_backoff_ms),
                max_backoff_ms: catalog_file
                    .max_backoff_ms
                    .unwrap_or(retry_defaults.max_backoff_ms),
                backoff_multiplier: catalog_file
                    .backoff_multiplier
                    .unwrap_or(retry_defaults.backoff_multiplier),
            },
        };

        Ok(Self {
            db_dir,
            port,
            logging_level,
            default_user_id,
            sync,
            catalog,
        })
    }

    pub fn playlist_db_path(&self) -> PathBuf {
        self.db_dir.join("playlists.db")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_temp_db_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    fn base_cli(db_dir: &TempDir) -> CliConfig {
        CliConfig {
            db_dir: Some(db_dir.path().to_path_buf()),
            port: 3001,
            logging_level: RequestsLoggingLevel::Path,
            default_user_id: "default".to_string(),
            cache_ttl_secs: 3600,
            catalog_base_url: None,
        }
    }

    #[test]
    fn test_parse_logging_level() {
        assert!(matches!(
            parse_logging_level("none"),
            Some(RequestsLoggingLevel::None)
        ));
        assert!(matches!(
            parse_logging_level("path"),
            Some(RequestsLoggingLevel::Path)
        ));
        assert!(matches!(
            parse_logging_level("headers"),
            Some(RequestsLoggingLevel::Headers)
        ));
        // Case insensitive
        assert!(matches!(
            parse_logging_level("PATH"),
            Some(RequestsLoggingLevel::Path)
        ));
        // Invalid
        assert!(parse_logging_level("invalid").is_none());
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = make_temp_db_dir();
        let mut cli = base_cli(&temp_dir);
        cli.port = 4001;
        cli.logging_level = RequestsLoggingLevel::Headers;
        cli.default_user_id = "alice".to_string();
        cli.cache_ttl_secs = 7200;
        cli.catalog_base_url = Some("http://localhost:9999/v1".to_string());

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.port, 4001);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Headers);
        assert_eq!(config.default_user_id, "alice");
        assert_eq!(config.sync.ttl_secs, 7200);
        assert_eq!(config.catalog.base_url, "http://localhost:9999/v1");
        // Untouched fields come from the defaults
        assert_eq!(config.sync.seed_track_count, 5);
        assert_eq!(config.catalog.page_size, 50);
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/should/be/overridden")),
            ..base_cli(&temp_dir)
        };

        let file_config = FileConfig {
            db_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            port: Some(4000),
            logging_level: Some("headers".to_string()),
            sync: Some(SyncConfig {
                cache_ttl_secs: Some(60),
                top_artists_limit: Some(3),
                ..Default::default()
            }),
            catalog: Some(CatalogConfig {
                features_batch_size: Some(25),
                max_retries: Some(7),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        // TOML values should override CLI
        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.port, 4000);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Headers);
        assert_eq!(config.sync.ttl_secs, 60);
        assert_eq!(config.sync.top_artists_limit, 3);
        assert_eq!(config.catalog.features_batch_size, 25);
        assert_eq!(config.catalog.retry.max_retries, 7);
        // CLI value used when TOML doesn't specify
        assert_eq!(config.default_user_id, "default");
        assert_eq!(config.sync.seed_track_count, 5);
    }

    #[test]
    fn test_resolve_missing_db_dir_error() {
        let cli = CliConfig::default();
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_dir must be specified"));
    }

    #[test]
    fn test_resolve_nonexistent_db_dir_error() {
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/nonexistent/path/that/should/not/exist")),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_db_dir_not_directory_error() {
        // Create a temporary file (not a directory)
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let cli = CliConfig {
            db_dir: Some(temp_file.path().to_path_buf()),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not a directory"));
    }

    #[test]
    fn test_playlist_db_path() {
        let temp_dir = make_temp_db_dir();
        let config = AppConfig::resolve(&base_cli(&temp_dir), None).unwrap();

        assert_eq!(
            config.playlist_db_path(),
            temp_dir.path().join("playlists.db")
        );
    }

    #[test]
    fn test_file_config_parses_toml_tables() {
        let toml_str = r#"
            port = 8080
            default_user_id = "bob"

            [sync]
            cache_ttl_secs = 120

            [catalog]
            base_url = "http://stub/v1"
            max_retries = 1
        "#;
        let file: FileConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(file.port, Some(8080));
        assert_eq!(file.default_user_id.as_deref(), Some("bob"));
        assert_eq!(file.sync.unwrap().cache_ttl_secs, Some(120));
        let catalog = file.catalog.unwrap();
        assert_eq!(catalog.base_url.as_deref(), Some("http://stub/v1"));
        assert_eq!(catalog.max_retries, Some(1));
    }
}
