//! vicdan - link-in-bio profiles for registered administrators
//!
//! This crate provides the HTTP service behind VicDan: administrator
//! registration and login, JWT-based access control, login rate limiting,
//! profile management and slug-based public profile pages with QR codes.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod otel;
pub mod profiles;
pub mod server;
pub mod storage;
