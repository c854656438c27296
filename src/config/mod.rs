//! Configuration management for vicdan
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Asset storage configuration (logos, QR codes)
    #[serde(default)]
    pub storage: StorageConfig,

    /// Public profile configuration
    #[serde(default)]
    pub public: PublicConfig,

    /// OpenTelemetry configuration
    #[serde(default)]
    pub otel: OtelConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables with prefix VICDAN_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("VICDAN_SERVER_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("VICDAN_SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid port number".to_string()))?;
        }

        if let Ok(path) = std::env::var("VICDAN_DATABASE_PATH") {
            config.database.path = path;
        }

        if let Ok(secret) = std::env::var("VICDAN_AUTH_JWT_SECRET") {
            config.auth.jwt_secret = Some(secret);
        }
        if let Ok(window) = std::env::var("VICDAN_AUTH_RATE_LIMIT_WINDOW_MINUTES") {
            config.auth.rate_limit.window_minutes = window
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid rate limit window".to_string()))?;
        }
        if let Ok(max) = std::env::var("VICDAN_AUTH_RATE_LIMIT_MAX_FAILURES") {
            config.auth.rate_limit.max_failures = max
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid rate limit threshold".to_string()))?;
        }

        if let Ok(path) = std::env::var("VICDAN_STORAGE_BASE_PATH") {
            config.storage.base_path = path;
        }
        if let Ok(url) = std::env::var("VICDAN_STORAGE_PUBLIC_URL") {
            config.storage.public_url = url;
        }
        if let Ok(url) = std::env::var("VICDAN_PUBLIC_BASE_URL") {
            config.public.base_url = url;
        }

        if let Ok(enabled) = std::env::var("VICDAN_OTEL_ENABLED") {
            config.otel.enabled = enabled.parse().unwrap_or(false);
        }
        if let Ok(endpoint) = std::env::var("VICDAN_OTEL_ENDPOINT") {
            config.otel.endpoint = Some(endpoint);
        }

        if let Ok(level) = std::env::var("VICDAN_LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Check settings the service cannot start without
    ///
    /// A missing signing secret is fatal: tokens could be neither issued
    /// nor verified.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.auth.jwt_secret.as_deref() {
            Some(secret) if !secret.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingRequired("auth.jwt_secret".to_string())),
        }

        if self.auth.rate_limit.max_failures == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.rate_limit.max_failures must be at least 1".to_string(),
            ));
        }

        if self.auth.rate_limit.window_minutes == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.rate_limit.window_minutes must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// HMAC secret used to sign identity tokens
    pub jwt_secret: Option<String>,

    /// Login rate limiting configuration
    #[serde(default)]
    pub rate_limit: LoginRateLimitConfig,
}

/// Rolling-window limit on failed logins per email
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginRateLimitConfig {
    /// Trailing window in minutes
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u32,

    /// Failed attempts within the window that trigger blocking
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
}

impl Default for LoginRateLimitConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            max_failures: default_max_failures(),
        }
    }
}

fn default_window_minutes() -> u32 {
    15
}

fn default_max_failures() -> u32 {
    5
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "/data/db/vicdan.db".to_string()
}

/// Asset storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Directory holding stored assets
    #[serde(default = "default_storage_base_path")]
    pub base_path: String,

    /// URL under which stored assets are reachable
    #[serde(default = "default_storage_public_url")]
    pub public_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_storage_base_path(),
            public_url: default_storage_public_url(),
        }
    }
}

fn default_storage_base_path() -> String {
    "/data/assets".to_string()
}

fn default_storage_public_url() -> String {
    "http://localhost:8080/assets".to_string()
}

/// Public profile configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicConfig {
    /// Origin used to build public profile URLs (and their QR codes)
    #[serde(default = "default_public_base_url")]
    pub base_url: String,

    /// Shared-cache freshness for public lookups, in seconds
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age_secs: u64,

    /// How long a stale public lookup may still be served, in seconds
    #[serde(default = "default_stale_while_revalidate")]
    pub stale_while_revalidate_secs: u64,
}

impl Default for PublicConfig {
    fn default() -> Self {
        Self {
            base_url: default_public_base_url(),
            cache_max_age_secs: default_cache_max_age(),
            stale_while_revalidate_secs: default_stale_while_revalidate(),
        }
    }
}

impl PublicConfig {
    /// Cache-Control value for anonymous profile lookups
    pub fn cache_control(&self) -> String {
        format!(
            "public, s-maxage={}, stale-while-revalidate={}",
            self.cache_max_age_secs, self.stale_while_revalidate_secs
        )
    }
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_cache_max_age() -> u64 {
    60
}

fn default_stale_while_revalidate() -> u64 {
    300
}

/// OpenTelemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtelConfig {
    /// Whether OpenTelemetry is enabled
    #[serde(default)]
    pub enabled: bool,

    /// OTLP endpoint URL
    pub endpoint: Option<String>,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            service_name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    "vicdan".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax; unknown variables are left untouched.
fn expand_env_vars(input: &str) -> String {
    let re = match regex_lite::Regex::new(r"\$\{([^}]+)\}") {
        Ok(re) => re,
        Err(_) => return input.to_string(),
    };

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
