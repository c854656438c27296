//! Authentication manager
//!
//! This module provides the main authentication interface for the application.
//! It handles administrator registration and the login flow: rate-limit
//! check, credential check, attempt recording and token issuing.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::database::Database;
use crate::error::{AuthError, DbError};
use crate::models::{
    is_valid_email, normalize_email, AdminIdentity, FailureReason, LoginAttempt, LoginRequest,
    LoginResponse, NewAdmin, RegisterRequest,
};

use super::ledger::{LoginLedger, RateLimitPolicy};
use super::password::{
    hash_password, is_strong_password, verify_dummy_password, verify_password,
};
use super::token::TokenService;

const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 100;

/// Where a login request came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Authentication manager
///
/// Owns the login ledger and the token service.
pub struct AuthManager<D: Database> {
    db: Arc<D>,
    ledger: LoginLedger<D>,
    tokens: Arc<TokenService>,
    policy: RateLimitPolicy,
    #[cfg(test)]
    pending_writes: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl<D: Database + 'static> AuthManager<D> {
    /// Create a new authentication manager
    pub fn new(db: Arc<D>, tokens: Arc<TokenService>, policy: RateLimitPolicy) -> Self {
        let ledger = LoginLedger::new(Arc::clone(&db));
        Self {
            db,
            ledger,
            tokens,
            policy,
            #[cfg(test)]
            pending_writes: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Token service used to issue and verify tokens
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Register a new administrator
    pub async fn register(&self, request: RegisterRequest) -> Result<AdminIdentity, AuthError> {
        validate_registration(&request)?;

        let password_hash = hash_password(&request.password)?;
        let admin = NewAdmin {
            name: request.name.trim().to_string(),
            email: normalize_email(&request.email),
            password_hash,
        };

        let id = match self.db.create_admin(&admin).await {
            Ok(id) => id,
            Err(DbError::ConstraintViolation(_)) => return Err(AuthError::EmailTaken),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create administrator");
                return Err(AuthError::Internal("database query failed".to_string()));
            }
        };

        tracing::info!(admin_id = id, email = %admin.email, "Administrator registered");

        Ok(AdminIdentity {
            id,
            name: admin.name,
            email: admin.email,
        })
    }

    /// Authenticate an administrator and issue a token
    ///
    /// Every outcome is recorded in the login ledger, including refusals
    /// caused by rate limiting.
    pub async fn login(
        &self,
        request: LoginRequest,
        context: LoginContext,
    ) -> Result<LoginResponse, AuthError> {
        let email = normalize_email(&request.email);
        if email.is_empty() || request.password.is_empty() {
            return Err(AuthError::Validation(vec![
                "email and password are required".to_string()
            ]));
        }

        let attempt = |failure: Option<FailureReason>| {
            let attempt = match failure {
                None => LoginAttempt::succeeded(Some(email.clone())),
                Some(reason) => LoginAttempt::failed(Some(email.clone()), reason),
            };
            attempt
                .with_ip(context.ip_address.clone())
                .with_user_agent(context.user_agent.clone())
        };

        if self.ledger.is_rate_limited(Some(&email), &self.policy).await {
            tracing::warn!(email = %email, ip = ?context.ip_address, "Login rate limited");
            self.record(attempt(Some(FailureReason::RateLimited)));
            return Err(AuthError::RateLimited);
        }

        let admin = match self.db.get_admin_by_email(&email).await {
            Ok(Some(admin)) => admin,
            Ok(None) => {
                verify_dummy_password(&request.password);
                tracing::info!(email = %email, "Login failed: unknown email");
                self.record(attempt(Some(FailureReason::UserNotFound)));
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to look up administrator");
                return Err(AuthError::Internal("database query failed".to_string()));
            }
        };

        if !verify_password(&request.password, &admin.password_hash) {
            tracing::info!(email = %email, "Login failed: wrong password");
            self.record(attempt(Some(FailureReason::InvalidPassword)));
            return Err(AuthError::InvalidCredentials);
        }

        let identity = admin.identity();
        let token = self.tokens.issue(&identity)?;
        self.record(attempt(None));

        tracing::info!(admin_id = identity.id, "Administrator logged in");

        Ok(LoginResponse {
            token,
            admin: identity,
        })
    }

    fn record(&self, attempt: LoginAttempt) {
        let write = self.ledger.record(attempt);
        self.track(write);
    }

    #[cfg(not(test))]
    fn track(&self, _write: JoinHandle<()>) {}

    #[cfg(test)]
    fn track(&self, write: JoinHandle<()>) {
        self.pending_writes.lock().unwrap().push(write);
    }

    /// Wait for every ledger write started so far
    #[cfg(test)]
    async fn flush_ledger(&self) {
        let writes = std::mem::take(&mut *self.pending_writes.lock().unwrap());
        for write in writes {
            write.await.unwrap();
        }
    }
}

/// Check a registration request, collecting one message per problem
fn validate_registration(request: &RegisterRequest) -> Result<(), AuthError> {
    let mut errors = Vec::new();

    let name_len = request.name.trim().chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&name_len) {
        errors.push(format!(
            "name: must be {} to {} characters",
            MIN_NAME_LEN, MAX_NAME_LEN
        ));
    }

    if !is_valid_email(request.email.trim()) {
        errors.push("email: must be a valid email address".to_string());
    }

    if !is_strong_password(&request.password) {
        errors.push(
            "password: must be at least 8 characters with lowercase, uppercase, digit and symbol"
                .to_string(),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AuthError::Validation(errors))
    }
}
