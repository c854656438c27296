//! SQLite implementation of the Database trait
//!
//! This module provides a SQLite-based implementation of the Database trait
//! using rusqlite and tokio-rusqlite for async operations.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use super::migrations::CREATE_SCHEMA;
use super::Database;
use crate::error::DbError;
use crate::models::{
    Admin, LoginAttempt, NewAdmin, NewProfile, Profile, ProfileLink, ProfileState,
    PublishUpdate,
};

const PROFILE_COLUMNS: &str = "id, owner_id, name, logo_url, email, description, theme, links, \
     state, slug, published_at, qr_url, created_at";

/// SQLite database implementation
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Create a new SQLite database connection
    ///
    /// Use `:memory:` for in-memory database or a file path for persistent storage.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(path).await?;

        // Run migrations
        conn.call(|conn| {
            conn.execute_batch(CREATE_SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Create a new in-memory database (useful for testing)
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::new(":memory:").await
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    // =========================================================================
    // Administrator operations
    // =========================================================================

    async fn create_admin(&self, admin: &NewAdmin) -> Result<i64, DbError> {
        let name = admin.name.clone();
        let email = admin.email.clone();
        let password_hash = admin.password_hash.clone();
        let created_at = format_datetime(Utc::now());

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO admins (name, email, password_hash, created_at)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    rusqlite::params![name, email, password_hash, created_at],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Into::into)
    }

    async fn get_admin_by_email(&self, email: &str) -> Result<Option<Admin>, DbError> {
        let email = email.to_string();

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, name, email, password_hash, created_at
                    FROM admins
                    WHERE email = ?1
                    "#,
                )?;

                let result = stmt
                    .query_row([&email], |row| {
                        Ok(Admin {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            email: row.get(2)?,
                            password_hash: row.get(3)?,
                            created_at: parse_datetime(row.get::<_, Option<String>>(4)?)
                                .unwrap_or_else(Utc::now),
                        })
                    })
                    .optional()?;

                Ok(result)
            })
            .await
            .map_err(Into::into)
    }

    // =========================================================================
    // Login attempt operations
    // =========================================================================

    async fn insert_login_attempt(&self, attempt: &LoginAttempt) -> Result<(), DbError> {
        let email = attempt.email.clone();
        let ip_address = attempt.ip_address.clone();
        let user_agent = attempt.user_agent.clone();
        let success = attempt.success;
        let failure_reason = attempt.failure_reason.clone();
        let created_at = format_datetime(attempt.created_at);

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO login_attempts
                    (email, ip_address, user_agent, success, failure_reason, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                    rusqlite::params![
                        email,
                        ip_address,
                        user_agent,
                        success,
                        failure_reason,
                        created_at
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    async fn count_failed_login_attempts(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, DbError> {
        let email = email.to_string();
        let since = format_datetime(since);

        self.conn
            .call(move |conn| {
                // Refused attempts do not extend the lockout
                let count: u32 = conn.query_row(
                    r#"
                    SELECT COUNT(*) FROM login_attempts
                    WHERE email = ?1
                      AND success = 0
                      AND created_at >= ?2
                      AND (failure_reason IS NULL OR failure_reason != 'rate_limited')
                    "#,
                    rusqlite::params![email, since],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
            .map_err(Into::into)
    }

    async fn list_login_attempts(&self, email: &str) -> Result<Vec<LoginAttempt>, DbError> {
        let email = email.to_string();

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT email, ip_address, user_agent, success, failure_reason, created_at
                    FROM login_attempts
                    WHERE email = ?1
                    ORDER BY created_at, id
                    "#,
                )?;

                let attempts = stmt
                    .query_map([&email], |row| {
                        Ok(LoginAttempt {
                            email: row.get(0)?,
                            ip_address: row.get(1)?,
                            user_agent: row.get(2)?,
                            success: row.get(3)?,
                            failure_reason: row.get(4)?,
                            created_at: parse_datetime(row.get::<_, Option<String>>(5)?)
                                .unwrap_or_else(Utc::now),
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(attempts)
            })
            .await
            .map_err(Into::into)
    }

    // =========================================================================
    // Profile operations
    // =========================================================================

    async fn create_profile(&self, profile: &NewProfile) -> Result<i64, DbError> {
        let owner_id = profile.owner_id;
        let name = profile.name.clone();
        let logo_url = profile.logo_url.clone();
        let email = profile.email.clone();
        let description = profile.description.clone();
        let theme = encode_json(&profile.theme)?;
        let links = encode_json(&profile.links)?;
        let state = profile.state.to_string();
        let created_at = format_datetime(Utc::now());

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO profiles
                    (owner_id, name, logo_url, email, description, theme, links, state, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    "#,
                    rusqlite::params![
                        owner_id,
                        name,
                        logo_url,
                        email,
                        description,
                        theme,
                        links,
                        state,
                        created_at
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Into::into)
    }

    async fn get_profile(&self, id: i64) -> Result<Option<Profile>, DbError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM profiles WHERE id = ?1",
                    PROFILE_COLUMNS
                ))?;

                let result = stmt.query_row([id], row_to_profile).optional()?;

                Ok(result)
            })
            .await
            .map_err(Into::into)
    }

    async fn list_profiles_by_owner(&self, owner_id: i64) -> Result<Vec<Profile>, DbError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM profiles WHERE owner_id = ?1 ORDER BY created_at DESC, id DESC",
                    PROFILE_COLUMNS
                ))?;

                let profiles = stmt
                    .query_map([owner_id], row_to_profile)?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(profiles)
            })
            .await
            .map_err(Into::into)
    }

    async fn update_profile(&self, profile: &Profile) -> Result<(), DbError> {
        let id = profile.id;
        let name = profile.name.clone();
        let logo_url = profile.logo_url.clone();
        let email = profile.email.clone();
        let description = profile.description.clone();
        let theme = encode_json(&profile.theme)?;
        let links = encode_json(&profile.links)?;
        let state = profile.state.to_string();

        let rows_affected = self
            .conn
            .call(move |conn| {
                // A published row keeps its state even if a stale read says otherwise
                let count = conn.execute(
                    r#"
                    UPDATE profiles
                    SET name = ?2, logo_url = ?3, email = ?4, description = ?5,
                        theme = ?6, links = ?7,
                        state = CASE WHEN state = 'published' THEN state ELSE ?8 END
                    WHERE id = ?1
                    "#,
                    rusqlite::params![id, name, logo_url, email, description, theme, links, state],
                )?;
                Ok(count)
            })
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    async fn delete_profile(&self, id: i64) -> Result<(), DbError> {
        let rows_affected = self
            .conn
            .call(move |conn| {
                let count = conn.execute("DELETE FROM profiles WHERE id = ?1", [id])?;
                Ok(count)
            })
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    async fn get_profile_by_slug(&self, slug: &str) -> Result<Option<Profile>, DbError> {
        let slug = slug.to_string();

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM profiles WHERE slug = ?1",
                    PROFILE_COLUMNS
                ))?;

                let result = stmt.query_row([&slug], row_to_profile).optional()?;

                Ok(result)
            })
            .await
            .map_err(Into::into)
    }

    async fn publish_profile(
        &self,
        id: i64,
        owner_id: i64,
        update: &PublishUpdate,
    ) -> Result<bool, DbError> {
        let slug = update.slug.clone();
        let published_at = format_datetime(update.published_at);
        let qr_url = update.qr_url.clone();

        let rows_affected = self
            .conn
            .call(move |conn| {
                let count = conn.execute(
                    r#"
                    UPDATE profiles
                    SET state = 'published', slug = ?3, published_at = ?4, qr_url = ?5
                    WHERE id = ?1 AND owner_id = ?2 AND state != 'published'
                    "#,
                    rusqlite::params![id, owner_id, slug, published_at, qr_url],
                )?;
                Ok(count)
            })
            .await?;

        Ok(rows_affected == 1)
    }
}

/// Map a row selected with `PROFILE_COLUMNS`
fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    let theme: String = row.get(6)?;
    let links: String = row.get(7)?;
    let state: String = row.get(8)?;

    Ok(Profile {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        logo_url: row.get(3)?,
        email: row.get(4)?,
        description: row.get(5)?,
        theme: decode_column(6, &theme, |raw| serde_json::from_str(raw))?,
        links: decode_column(7, &links, |raw| {
            serde_json::from_str::<Vec<ProfileLink>>(raw)
        })?,
        state: decode_column(8, &state, |raw| raw.parse::<ProfileState>())?,
        slug: row.get(9)?,
        published_at: parse_datetime(row.get::<_, Option<String>>(10)?),
        qr_url: row.get(11)?,
        created_at: parse_datetime(row.get::<_, Option<String>>(12)?).unwrap_or_else(Utc::now),
    })
}

/// Decode a text column, failing the row when the stored value is corrupt
fn decode_column<T, E>(
    index: usize,
    raw: &str,
    decode: impl FnOnce(&str) -> Result<T, E>,
) -> rusqlite::Result<T>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    decode(raw).map_err(|e| {
        let e = e.into();
        tracing::warn!(column = index, error = %e, "Corrupt profile column");
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, e)
    })
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, DbError> {
    serde_json::to_string(value).map_err(|e| DbError::Serialization(e.to_string()))
}

/// Fixed-width UTC timestamps so stored values compare correctly as text
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a datetime string to DateTime<Utc>
fn parse_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}
