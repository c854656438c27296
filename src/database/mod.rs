//! Database layer for vicdan
//!
//! This module defines the database trait and SQLite implementation.

pub mod migrations;
pub mod sqlite;

pub use sqlite::SqliteDatabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DbError;
use crate::models::{Admin, LoginAttempt, NewAdmin, NewProfile, Profile, PublishUpdate};

/// Database trait for data persistence
///
/// This trait defines all database operations needed by the application.
/// It uses `async_trait` for async methods and `mockall::automock` for testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Database: Send + Sync {
    // =========================================================================
    // Administrator operations
    // =========================================================================

    /// Insert an administrator
    ///
    /// Returns the new ID; a duplicate email is a `ConstraintViolation`
    async fn create_admin(&self, admin: &NewAdmin) -> Result<i64, DbError>;

    /// Get an administrator by email (case-insensitive)
    async fn get_admin_by_email(&self, email: &str) -> Result<Option<Admin>, DbError>;

    // =========================================================================
    // Login attempt operations
    // =========================================================================

    /// Append a login attempt to the ledger
    async fn insert_login_attempt(&self, attempt: &LoginAttempt) -> Result<(), DbError>;

    /// Count failed attempts for `email` created at or after `since`
    async fn count_failed_login_attempts(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, DbError>;

    /// Attempts recorded for `email`, oldest first
    async fn list_login_attempts(&self, email: &str) -> Result<Vec<LoginAttempt>, DbError>;

    // =========================================================================
    // Profile operations
    // =========================================================================

    /// Insert a profile
    ///
    /// Returns the ID of the inserted profile
    async fn create_profile(&self, profile: &NewProfile) -> Result<i64, DbError>;

    /// Get a profile by ID
    async fn get_profile(&self, id: i64) -> Result<Option<Profile>, DbError>;

    /// List profiles owned by an administrator, newest first
    async fn list_profiles_by_owner(&self, owner_id: i64) -> Result<Vec<Profile>, DbError>;

    /// Write the editable fields and state of a profile
    async fn update_profile(&self, profile: &Profile) -> Result<(), DbError>;

    /// Delete a profile by ID
    async fn delete_profile(&self, id: i64) -> Result<(), DbError>;

    /// Get a profile by its public slug, regardless of state
    async fn get_profile_by_slug(&self, slug: &str) -> Result<Option<Profile>, DbError>;

    /// Apply the publish transition in one conditional update
    ///
    /// Returns false when no row matched: the profile is missing, owned by
    /// someone else, or already published.
    async fn publish_profile(
        &self,
        id: i64,
        owner_id: i64,
        update: &PublishUpdate,
    ) -> Result<bool, DbError>;
}
