//! Login attempt ledger models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a login attempt did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Attempt was refused before credentials were checked
    RateLimited,
    /// No administrator with that email
    UserNotFound,
    /// Password did not match
    InvalidPassword,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::RateLimited => "rate_limited",
            FailureReason::UserNotFound => "user_not_found",
            FailureReason::InvalidPassword => "invalid_password",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One login attempt, appended to the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttempt {
    /// Normalized email the attempt was made for
    pub email: Option<String>,

    /// Source address of the request
    pub ip_address: Option<String>,

    /// User-Agent header of the request
    pub user_agent: Option<String>,

    /// Whether the credentials were accepted
    pub success: bool,

    /// Failure reason (None on success)
    pub failure_reason: Option<String>,

    /// When the attempt happened
    pub created_at: DateTime<Utc>,
}

impl LoginAttempt {
    /// A successful attempt
    pub fn succeeded(email: Option<String>) -> Self {
        Self {
            email,
            ip_address: None,
            user_agent: None,
            success: true,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }

    /// A failed attempt
    pub fn failed(email: Option<String>, reason: FailureReason) -> Self {
        Self {
            email,
            ip_address: None,
            user_agent: None,
            success: false,
            failure_reason: Some(reason.to_string()),
            created_at: Utc::now(),
        }
    }

    /// Set source address
    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }

    /// Set user agent
    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Override the timestamp
    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}
