//! Authentication system for vicdan
//!
//! This module provides authentication and authorization functionality:
//! - Identity token issuing and verification
//! - Password hashing
//! - Login attempt ledger with rolling-window rate limiting
//! - Registration and login flow

pub mod ledger;
pub mod manager;
pub mod password;
pub mod token;

pub use ledger::{LoginLedger, RateLimitPolicy};
pub use manager::{AuthManager, LoginContext};
pub use password::{hash_password, verify_password};
pub use token::{extract_bearer, TokenService, Verification};
