//! Administrator domain models
//!
//! This module defines the administrator account, the identity carried
//! in issued tokens, and the request/response bodies of the auth API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Administrator account stored in database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    /// Unique administrator ID
    pub id: i64,

    /// Display name
    pub name: String,

    /// Login email (unique, case-insensitive)
    pub email: String,

    /// Argon2id password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// When the account was created
    pub created_at: DateTime<Utc>,
}

impl Admin {
    /// Identity embedded in tokens issued for this administrator
    pub fn identity(&self) -> AdminIdentity {
        AdminIdentity {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Administrator record to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAdmin {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Identity asserted by a valid token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminIdentity {
    /// Administrator ID (the token subject)
    pub id: i64,

    /// Display name
    pub name: String,

    /// Login email
    pub email: String,
}

/// Request to register a new administrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful login response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Signed identity token
    pub token: String,

    /// The authenticated administrator
    pub admin: AdminIdentity,
}

/// Longest email address accepted anywhere
pub const MAX_EMAIL_LEN: usize = 254;

/// Lowercase and trim an email for storage and lookups
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Syntactic email check: one `@`, no whitespace, a dotted domain
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.len() > MAX_EMAIL_LEN {
        return false;
    }
    match regex_lite::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]+$") {
        Ok(re) => re.is_match(email),
        Err(_) => false,
    }
}
