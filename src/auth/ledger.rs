//! Login attempt ledger
//!
//! Every login attempt is appended to the database on a background task.
//! The rolling-window failure count for an email decides whether further
//! attempts for that email are refused. Limiting by source address is not
//! enabled; the address is only recorded.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::task::JoinHandle;

use crate::config::LoginRateLimitConfig;
use crate::database::Database;
use crate::models::{normalize_email, LoginAttempt};

/// Rolling-window threshold for failed logins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Trailing window
    pub window: Duration,

    /// Failures within the window that trigger blocking
    pub max_failures: u32,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            window: Duration::minutes(15),
            max_failures: 5,
        }
    }
}

impl From<&LoginRateLimitConfig> for RateLimitPolicy {
    fn from(config: &LoginRateLimitConfig) -> Self {
        Self {
            window: Duration::minutes(i64::from(config.window_minutes)),
            max_failures: config.max_failures,
        }
    }
}

/// Append-only record of login attempts
pub struct LoginLedger<D: Database> {
    db: Arc<D>,
}

impl<D: Database + 'static> LoginLedger<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self { db }
    }

    /// Record an attempt without waiting for the write
    ///
    /// Write failures are logged and never surface to the caller. The
    /// returned handle only exists so the write can be awaited in tests.
    pub fn record(&self, mut attempt: LoginAttempt) -> JoinHandle<()> {
        attempt.email = attempt.email.as_deref().map(normalize_email);
        let db = Arc::clone(&self.db);

        tokio::spawn(async move {
            if let Err(e) = db.insert_login_attempt(&attempt).await {
                tracing::warn!(
                    error = %e,
                    email = ?attempt.email,
                    success = attempt.success,
                    "Failed to record login attempt"
                );
            }
        })
    }

    /// Whether `email` has reached the failure threshold within the window
    ///
    /// A missing email is never limited. A failed count query lets the
    /// attempt through.
    pub async fn is_rate_limited(&self, email: Option<&str>, policy: &RateLimitPolicy) -> bool {
        let email = match email.map(normalize_email) {
            Some(email) if !email.is_empty() => email,
            _ => return false,
        };

        let since = Utc::now() - policy.window;
        match self.db.count_failed_login_attempts(&email, since).await {
            Ok(count) => count >= policy.max_failures,
            Err(e) => {
                tracing::warn!(error = %e, email = %email, "Failed to count login failures");
                false
            }
        }
    }
}
