//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use vicdan::auth::{AuthManager, RateLimitPolicy, TokenService};
use vicdan::config::{PublicConfig, ServerConfig};
use vicdan::database::{Database, SqliteDatabase};
use vicdan::models::LoginAttempt;
use vicdan::otel::Metrics;
use vicdan::profiles::ProfileService;
use vicdan::server::{AppState, Server};
use vicdan::storage::FilesystemAssetStore;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const TEST_PASSWORD: &str = "Str0ng!pass";

/// Create an in-memory database for testing
pub async fn create_test_database() -> Arc<SqliteDatabase> {
    Arc::new(
        SqliteDatabase::in_memory()
            .await
            .expect("Failed to create test database"),
    )
}

/// Create a test application state backed by `database` and `assets_dir`
pub fn create_test_state(
    database: Arc<SqliteDatabase>,
    assets_dir: &TempDir,
    public_base_url: &str,
) -> AppState<SqliteDatabase> {
    let tokens = Arc::new(TokenService::new(TEST_SECRET).expect("Failed to create token service"));
    let assets = Arc::new(FilesystemAssetStore::new(
        assets_dir.path(),
        format!("{}/assets", public_base_url),
    ));

    AppState {
        auth_manager: Arc::new(AuthManager::new(
            Arc::clone(&database),
            Arc::clone(&tokens),
            RateLimitPolicy::default(),
        )),
        profile_service: Arc::new(ProfileService::new(database, assets, public_base_url)),
        token_service: tokens,
        public: Arc::new(PublicConfig {
            base_url: public_base_url.to_string(),
            ..Default::default()
        }),
        metrics: Arc::new(Metrics::noop()),
        assets_dir: Some(assets_dir.path().to_path_buf()),
    }
}

/// A running server with its backing stores
pub struct TestApp {
    pub addr: SocketAddr,
    pub database: Arc<SqliteDatabase>,
    pub assets_dir: TempDir,
    pub client: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
}

/// Run a test server in the background on a free port
///
/// The server shuts down when the returned `TestApp` is dropped.
pub async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");
    let base_url = format!("http://{}", addr);

    let database = create_test_database().await;
    let assets_dir = TempDir::new().expect("Failed to create asset dir");
    let state = create_test_state(Arc::clone(&database), &assets_dir, &base_url);

    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: addr.port(),
    };
    let server = Server::new(config, state);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    tokio::spawn(async move {
        server
            .serve(listener, async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to build client");

    TestApp {
        addr,
        database,
        assets_dir,
        client,
        shutdown: Some(shutdown_tx),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn register(&self, name: &str, email: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/register"))
            .json(&json!({"name": name, "email": email, "password": TEST_PASSWORD}))
            .send()
            .await
            .expect("register request failed")
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/login"))
            .json(&json!({"email": email, "password": password}))
            .send()
            .await
            .expect("login request failed")
    }

    /// Wait until at least `count` login attempts are stored for `email`
    ///
    /// Ledger writes land on a background task after the response is sent.
    pub async fn wait_for_attempts(&self, email: &str, count: usize) -> Vec<LoginAttempt> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let attempts = self
                .database
                .list_login_attempts(email)
                .await
                .expect("failed to list login attempts");
            if attempts.len() >= count {
                return attempts;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {} login attempts for {}, found {}",
                count,
                email,
                attempts.len()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Register an administrator and return a fresh token
    pub async fn admin_token(&self, email: &str) -> String {
        let response = self.register("Test Admin", email).await;
        assert_eq!(response.status(), 201);

        let response = self.login(email, TEST_PASSWORD).await;
        assert_eq!(response.status(), 200);

        let body: Value = response.json().await.expect("invalid login body");
        body["token"]
            .as_str()
            .expect("token missing")
            .to_string()
    }

    /// Create a profile and return its JSON representation
    pub async fn create_profile(&self, token: &str, body: Value) -> Value {
        let response = self
            .client
            .post(self.url("/api/profiles"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("create profile request failed");
        assert_eq!(response.status(), 201);
        response.json().await.expect("invalid profile body")
    }

    pub async fn publish(&self, token: &str, id: i64) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/profiles/{}/publish", id)))
            .bearer_auth(token)
            .send()
            .await
            .expect("publish request failed")
    }

    /// Files currently stored under the QR asset directory
    pub fn qr_files(&self) -> Vec<String> {
        match std::fs::read_dir(self.assets_dir.path().join("qr")) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => vec![],
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
