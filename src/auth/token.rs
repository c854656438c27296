//! Identity token issuing and verification
//!
//! Tokens are HS256-signed JWTs asserting an administrator identity for
//! one day. Verification never fails with an error: callers get
//! [`Verification::Invalid`] for anything that is not a well-formed,
//! correctly signed, unexpired admin token.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::error::AuthError;
use crate::models::AdminIdentity;

/// Role embedded in every token
pub const ADMIN_ROLE: &str = "admin";

/// Token lifetime in seconds (one day)
pub const TOKEN_LIFETIME_SECS: i64 = 24 * 60 * 60;

/// Prefix of an Authorization header carrying a token
const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    name: String,
    email: String,
    role: String,
    iat: i64,
    exp: i64,
}

/// Outcome of verifying a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Signature, expiry and role check out
    Valid(AdminIdentity),
    /// Anything else
    Invalid,
}

impl Verification {
    pub fn identity(self) -> Option<AdminIdentity> {
        match self {
            Verification::Valid(identity) => Some(identity),
            Verification::Invalid => None,
        }
    }
}

/// Issues and verifies identity tokens with a fixed signing secret
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    /// Create a token service
    ///
    /// An empty secret is a configuration error.
    pub fn new(secret: &str) -> Result<Self, ConfigError> {
        if secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("auth.jwt_secret".to_string()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Issue a token for `identity`, valid for one day from now
    pub fn issue(&self, identity: &AdminIdentity) -> Result<String, AuthError> {
        self.issue_at(identity, Utc::now())
    }

    fn issue_at(&self, identity: &AdminIdentity, now: DateTime<Utc>) -> Result<String, AuthError> {
        let iat = now.timestamp();
        let claims = Claims {
            sub: identity.id.to_string(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            role: ADMIN_ROLE.to_string(),
            iat,
            exp: iat + TOKEN_LIFETIME_SECS,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("token signing failed: {}", e)))
    }

    /// Verify a token and return the identity it asserts
    pub fn verify(&self, token: &str) -> Verification {
        let claims = match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!(error = %e, "Token verification failed");
                return Verification::Invalid;
            }
        };

        if claims.role != ADMIN_ROLE {
            tracing::debug!(role = %claims.role, "Token has unexpected role");
            return Verification::Invalid;
        }

        let id = match claims.sub.parse::<i64>() {
            Ok(id) => id,
            Err(_) => {
                tracing::debug!(sub = %claims.sub, "Token subject is not an admin id");
                return Verification::Invalid;
            }
        };

        Verification::Valid(AdminIdentity {
            id,
            name: claims.name,
            email: claims.email,
        })
    }
}

/// Extract the token from an Authorization header value
///
/// # Example
///
/// ```
/// use vicdan::auth::token::extract_bearer;
///
/// assert_eq!(extract_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
/// assert_eq!(extract_bearer("Basic dXNlcg=="), None);
/// assert_eq!(extract_bearer("Bearer "), None);
/// ```
pub fn extract_bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix(BEARER_PREFIX)
        .filter(|token| !token.is_empty())
}
