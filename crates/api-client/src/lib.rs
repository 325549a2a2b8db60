//! Typed REST client for the Gateway APTO admin backend.
//!
//! This crate intentionally exposes a small surface:
//! - bearer-token JSON transport with bounded retry
//! - the admin CRUD endpoints (login, payments, packages, users, stats)
//! - client-side input validation for the forms that feed those endpoints

pub mod admin;
pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod validate;

pub use auth::{MemoryTokenStore, TokenStore};
pub use client::{ApiClient, ApiClientConfig, DEFAULT_REQUEST_ATTEMPTS, DEFAULT_TIMEOUT_MS};
pub use error::{ApiError, Result};
pub use reqwest::StatusCode;
