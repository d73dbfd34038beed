use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tasteprint_server::catalog::{CatalogPort, HttpCatalogClient};
use tasteprint_server::config::{AppConfig, CliConfig, FileConfig};
use tasteprint_server::playlist_store::SqlitePlaylistStore;
use tasteprint_server::server::{run_server, RequestsLoggingLevel, ServerConfig};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the SQLite playlist database.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. Values in it override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Owner tag for playlists synced without an explicit user id.
    #[clap(long, default_value = "default")]
    pub default_user_id: String,

    /// Maximum age in seconds before cached playlist data is re-fetched.
    #[clap(long, default_value_t = 3600)]
    pub cache_ttl_secs: u64,

    /// Base URL of the catalog provider API.
    #[clap(long)]
    pub catalog_base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir,
        port: cli_args.port,
        logging_level: cli_args.logging_level,
        default_user_id: cli_args.default_user_id,
        cache_ttl_secs: cli_args.cache_ttl_secs,
        catalog_base_url: cli_args.catalog_base_url,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    let db_path = config.playlist_db_path();
    info!("Opening SQLite playlist database at {:?}...", db_path);
    let playlist_store = Arc::new(SqlitePlaylistStore::new(&db_path)?);

    info!("Catalog provider at {}", config.catalog.base_url);
    let catalog: Arc<dyn CatalogPort> = Arc::new(HttpCatalogClient::new(config.catalog.clone())?);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, stopping...");
            signal_token.cancel();
        }
    });

    let server_config = ServerConfig {
        requests_logging_level: config.logging_level.clone(),
        port: config.port,
        default_user_id: config.default_user_id.clone(),
    };

    info!("Ready to serve at port {}!", config.port);
    run_server(
        server_config,
        playlist_store,
        catalog,
        config.sync.clone(),
        shutdown,
    )
    .await
}
