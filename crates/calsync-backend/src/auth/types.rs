//! Auth-related types and configuration.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims of a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (local user id)
    pub sub: Uuid,
    pub email: Option<String>,
    /// Always `session`; keeps other tokens signed with the same secret out
    pub purpose: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// Claims of the OAuth `state` parameter sent to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateClaims {
    pub sub: Uuid,
    pub purpose: String,
    /// Makes every state value unique
    pub nonce: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// Validated user from JWT, available to handlers as a request extension
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
}

/// Auth configuration loaded from environment
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_duration_days: i64,
    pub cookie_name: String,
    /// Lifetime of OAuth state tokens
    pub state_ttl_minutes: i64,
}

impl AuthConfig {
    /// Load auth configuration from environment variables.
    ///
    /// Required env vars:
    /// - `JWT_SECRET`: Secret key for signing JWTs
    ///
    /// Optional:
    /// - `AUTH_TOKEN_DAYS` (default 7)
    /// - `AUTH_COOKIE_NAME` (default `auth_token`)
    pub fn from_env() -> Result<Self, String> {
        let jwt_secret =
            std::env::var("JWT_SECRET").map_err(|_| "JWT_SECRET must be set".to_string())?;

        if jwt_secret.len() < 16 {
            return Err("JWT_SECRET must be at least 16 characters".to_string());
        }

        let token_duration_days = std::env::var("AUTH_TOKEN_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(7);

        Ok(Self {
            jwt_secret,
            token_duration_days,
            cookie_name: std::env::var("AUTH_COOKIE_NAME")
                .unwrap_or_else(|_| "auth_token".to_string()),
            state_ttl_minutes: 10,
        })
    }
}
