//! Domain models for vicdan
//!
//! This module contains the core domain models used throughout the application.

pub mod admin;
pub mod login_attempt;
pub mod profile;

// Re-export commonly used types
pub use admin::{
    is_valid_email, normalize_email, Admin, AdminIdentity, LoginRequest, LoginResponse, NewAdmin,
    RegisterRequest,
};
pub use login_attempt::{FailureReason, LoginAttempt};
pub use profile::{
    CreateProfileRequest, NewProfile, Profile, ProfileLink, ProfileState, PublicProfile,
    PublishResponse, PublishUpdate, UpdateProfileRequest,
};
