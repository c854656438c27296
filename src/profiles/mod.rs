//! Link-in-bio profiles
//!
//! Owner-facing profile management, the one-way publish transition, and
//! slug-based public resolution.

pub mod qr;
pub mod service;
pub mod slug;

pub use qr::render_qr_svg;
pub use service::ProfileService;
pub use slug::{generate_slug, is_public_slug, SLUG_PREFIX};
