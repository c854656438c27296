//! Database migrations for vicdan
//!
//! This module contains SQL migrations for the SQLite database schema.

/// SQL statement to create the initial database schema
pub const CREATE_SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Administrators table
CREATE TABLE IF NOT EXISTS admins (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Login attempt ledger (append-only)
CREATE TABLE IF NOT EXISTS login_attempts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT,
    ip_address TEXT,
    user_agent TEXT,
    success INTEGER NOT NULL,
    failure_reason TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_login_attempts_email_time
    ON login_attempts(email, success, created_at);

-- Profiles table
CREATE TABLE IF NOT EXISTS profiles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL REFERENCES admins(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    logo_url TEXT,
    email TEXT,
    description TEXT,
    theme TEXT NOT NULL DEFAULT '{}',
    links TEXT NOT NULL DEFAULT '[]',
    state TEXT NOT NULL DEFAULT 'draft'
        CHECK (state IN ('draft', 'active', 'inactive', 'published')),
    slug TEXT UNIQUE,
    published_at TEXT,
    qr_url TEXT,
    created_at TEXT NOT NULL,
    CHECK ((state = 'published' AND slug IS NOT NULL)
        OR (state != 'published' AND slug IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_profiles_owner ON profiles(owner_id);
"#;

/// Get the migration version
pub fn migration_version() -> i32 {
    1
}
