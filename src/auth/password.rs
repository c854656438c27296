//! Password hashing and verification
//!
//! Administrator passwords are stored as Argon2id hashes in PHC format.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use std::sync::OnceLock;

use crate::error::AuthError;

/// Hash a password using Argon2id
///
/// The hash includes a random salt and uses the crate's default parameters.
///
/// # Arguments
///
/// * `password` - The plaintext password
///
/// # Returns
///
/// The Argon2id hash string (PHC format)
///
/// # Example
///
/// ```
/// use vicdan::auth::password::hash_password;
///
/// let hash = hash_password("Sup3r$ecret").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(format!("password hashing failed: {}", e)))
}

/// Verify a password against a stored hash
///
/// Returns `false` for a mismatch and for a hash that cannot be parsed.
///
/// # Example
///
/// ```
/// use vicdan::auth::password::{hash_password, verify_password};
///
/// let hash = hash_password("Sup3r$ecret").unwrap();
/// assert!(verify_password("Sup3r$ecret", &hash));
/// assert!(!verify_password("wrong", &hash));
/// ```
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Run a full verification against a throwaway hash
///
/// Used when no account matches, so an unknown email costs the same Argon2
/// work as a wrong password. Always returns `false`.
pub fn verify_dummy_password(password: &str) -> bool {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

    let hash = DUMMY_HASH.get_or_init(|| hash_password("vicdan-dummy-password").ok());
    if let Some(hash) = hash {
        verify_password(password, hash);
    }
    false
}

/// Whether a password meets the registration policy
///
/// At least 8 characters with a lowercase letter, an uppercase letter,
/// a digit and a symbol.
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(|c| c.is_lowercase())
        && password.chars().any(|c| c.is_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password
            .chars()
            .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
}
