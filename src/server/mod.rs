//! HTTP server components for vicdan
//!
//! This module provides the HTTP server infrastructure including:
//! - Router configuration and route handlers
//! - The access gate and logging middleware
//! - Server-rendered pages
//! - Server lifecycle management

pub mod middleware;
pub mod pages;
pub mod router;

pub use middleware::{access_gate, classify_path, AuthenticatedAdmin, PathAccess, SESSION_COOKIE};
pub use router::{build_router, AppState, HealthResponse};

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::database::Database;

/// HTTP Server for vicdan
///
/// Manages the axum server lifecycle, including:
/// - Binding to configured address
/// - Applying middleware layers
/// - Graceful shutdown handling
pub struct Server<D: Database + 'static> {
    config: ServerConfig,
    state: AppState<D>,
}

impl<D: Database + 'static> Server<D> {
    /// Create a new server instance
    pub fn new(config: ServerConfig, state: AppState<D>) -> Self {
        Self { config, state }
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(
            self.config.host.parse().unwrap_or([0, 0, 0, 0].into()),
            self.config.port,
        )
    }

    /// Run the server until shutdown signal is received
    ///
    /// # Arguments
    ///
    /// * `shutdown` - Future that resolves when the server should shut down
    ///
    /// # Returns
    ///
    /// Ok(()) if server shuts down gracefully, Err if there was an error
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let addr = self.bind_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until shutdown
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::Bind(e.to_string()))?;
        let app = build_router(self.state);

        // Apply middleware layers
        let app = app
            .layer(tower_http::trace::TraceLayer::new_for_http())
            .layer(tower_http::compression::CompressionLayer::new());

        tracing::info!("Server listening on {}", addr);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address
    #[error("Failed to bind to address: {0}")]
    Bind(String),

    /// Failed to serve requests
    #[error("Server error: {0}")]
    Serve(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthManager, RateLimitPolicy, TokenService};
    use crate::config::PublicConfig;
    use crate::database::MockDatabase;
    use crate::otel::Metrics;
    use crate::profiles::ProfileService;
    use crate::storage::MockAssetStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn create_test_state() -> AppState<MockDatabase> {
        let db = Arc::new(MockDatabase::new());
        let tokens = Arc::new(TokenService::new("server-test-secret").unwrap());

        AppState {
            auth_manager: Arc::new(AuthManager::new(
                Arc::clone(&db),
                Arc::clone(&tokens),
                RateLimitPolicy::default(),
            )),
            profile_service: Arc::new(ProfileService::new(
                db,
                Arc::new(MockAssetStore::new()),
                "http://localhost:8080",
            )),
            token_service: tokens,
            public: Arc::new(PublicConfig::default()),
            metrics: Arc::new(Metrics::noop()),
            assets_dir: None,
        }
    }

    // Test 1: Server can be created with config
    #[test]
    fn test_server_new() {
        let config = ServerConfig::default();
        let state = create_test_state();
        let server = Server::new(config, state);
        assert_eq!(server.bind_addr().port(), 8080);
    }

    // Test 2: Server bind address calculation
    #[test]
    fn test_server_bind_addr() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 9090,
        };
        let state = create_test_state();
        let server = Server::new(config, state);
        assert_eq!(server.bind_addr().to_string(), "127.0.0.1:9090");
    }

    // Test 3: Unparseable host falls back to all interfaces
    #[test]
    fn test_server_bind_addr_fallback() {
        let config = ServerConfig {
            host: "not-an-ip".to_string(),
            port: 8081,
        };
        let server = Server::new(config, create_test_state());
        assert_eq!(server.bind_addr().to_string(), "0.0.0.0:8081");
    }

    // Test 4: Server graceful shutdown
    #[tokio::test]
    async fn test_server_graceful_shutdown() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign a port
        };
        let state = create_test_state();
        let server = Server::new(config, state);

        let shutdown = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
        };

        let handle = tokio::spawn(async move { server.run(shutdown).await });

        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }

    // Test 5: Health check over a real socket
    #[tokio::test]
    async fn test_server_serves_health() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Server::new(ServerConfig::default(), create_test_state());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            server
                .serve(listener, async {
                    rx.await.ok();
                })
                .await
        });

        let response = reqwest::get(format!("http://{}/health", addr))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        tx.send(()).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    // Test 6: ServerError display messages
    #[test]
    fn test_server_error_display() {
        let bind_err = ServerError::Bind("address in use".to_string());
        assert_eq!(
            bind_err.to_string(),
            "Failed to bind to address: address in use"
        );

        let serve_err = ServerError::Serve("connection reset".to_string());
        assert_eq!(serve_err.to_string(), "Server error: connection reset");

        let config_err = ServerError::Config("missing field".to_string());
        assert_eq!(config_err.to_string(), "Configuration error: missing field");
    }
}
