//! Authentication module for JWT-based auth.
//!
//! This module provides:
//! - JWT token creation and validation
//! - Signed OAuth `state` tokens for the account connection flow
//! - `require_auth` middleware for protecting routes

pub mod jwt;
mod middleware;
pub mod types;

pub use middleware::require_auth;
pub use types::{AuthConfig, AuthUser};
