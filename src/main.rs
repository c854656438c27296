//! vicdan - link-in-bio profiles with one-way publishing
//!
//! This is the main entry point for the vicdan application.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use vicdan::auth::{AuthManager, RateLimitPolicy, TokenService};
use vicdan::config::{Config, ConfigError};
use vicdan::database::SqliteDatabase;
use vicdan::otel::{init_tracing, Metrics, Telemetry};
use vicdan::profiles::ProfileService;
use vicdan::server::{AppState, Server};
use vicdan::storage::FilesystemAssetStore;

/// vicdan - link-in-bio profiles with one-way publishing
#[derive(Parser, Debug)]
#[command(name = "vicdan")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "VICDAN_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration; a missing signing secret stops startup here
    let config = load_config(&args)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    // Initialize telemetry
    let telemetry = Telemetry::new(&config.otel)?;

    // Initialize tracing/logging
    init_tracing(&telemetry, &config.logging.level)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting vicdan");

    let metrics = Arc::new(Metrics::new(&telemetry.meter()));

    // Initialize database
    let database = SqliteDatabase::new(&config.database.path).await?;
    let database = Arc::new(database);
    info!(path = %config.database.path, "Database initialized");

    // Initialize asset storage
    let assets = FilesystemAssetStore::new_with_init(&config.storage).await?;
    let assets_dir = assets.base_path().clone();
    info!(path = %assets_dir.display(), "Asset storage initialized");

    // Initialize authentication
    let secret = config
        .auth
        .jwt_secret
        .as_deref()
        .ok_or(ConfigError::MissingRequired("auth.jwt_secret".to_string()))?;
    let token_service = Arc::new(TokenService::new(secret)?);
    let policy = RateLimitPolicy::from(&config.auth.rate_limit);
    let auth_manager = Arc::new(AuthManager::new(
        Arc::clone(&database),
        Arc::clone(&token_service),
        policy,
    ));
    info!(
        window_minutes = config.auth.rate_limit.window_minutes,
        max_failures = config.auth.rate_limit.max_failures,
        "Authentication manager initialized"
    );

    let profile_service = Arc::new(ProfileService::new(
        Arc::clone(&database),
        Arc::new(assets),
        config.public.base_url.clone(),
    ));

    // Create application state
    let state = AppState {
        auth_manager,
        profile_service,
        token_service,
        public: Arc::new(config.public.clone()),
        metrics,
        assets_dir: Some(assets_dir),
    };

    // Create and start the HTTP server
    let server = Server::new(config.server.clone(), state);
    let shutdown_signal = shutdown_signal();

    info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting HTTP server"
    );

    // Run the server
    let result = server.run(shutdown_signal).await;

    // Shutdown OpenTelemetry
    if let Err(e) = telemetry.shutdown() {
        error!(error = %e, "Failed to shutdown OpenTelemetry");
    }

    info!("vicdan shutdown complete");

    result.map_err(Into::into)
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
