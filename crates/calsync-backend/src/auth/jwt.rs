//! JWT token creation and validation.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use super::types::{AuthConfig, Claims, StateClaims};

const SESSION_PURPOSE: &str = "session";
const CONNECT_PURPOSE: &str = "connect";

/// Create a new session token for a user.
pub fn create_token(
    config: &AuthConfig,
    user_id: Uuid,
    email: Option<String>,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::days(config.token_duration_days);

    let claims = Claims {
        sub: user_id,
        email,
        purpose: SESSION_PURPOSE.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// Validate a session token and return claims.
pub fn validate_token(
    config: &AuthConfig,
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    if token_data.claims.purpose != SESSION_PURPOSE {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidToken.into());
    }

    Ok(token_data.claims)
}

/// Check if token should be refreshed (older than 1 day).
pub fn should_refresh(claims: &Claims) -> bool {
    let now = Utc::now().timestamp();
    let age_seconds = now - claims.iat;
    let one_day_seconds = 86400;
    age_seconds > one_day_seconds
}

/// Short-lived token carried through the provider consent screen as `state`.
pub fn create_state_token(
    config: &AuthConfig,
    user_id: Uuid,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = StateClaims {
        sub: user_id,
        purpose: CONNECT_PURPOSE.to_string(),
        nonce: Uuid::new_v4(),
        iat: now.timestamp(),
        exp: (now + Duration::minutes(config.state_ttl_minutes)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// Validate an OAuth `state` value and return the user it was issued for.
pub fn validate_state_token(
    config: &AuthConfig,
    token: &str,
) -> Result<Uuid, jsonwebtoken::errors::Error> {
    let token_data = decode::<StateClaims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    if token_data.claims.purpose != CONNECT_PURPOSE {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidToken.into());
    }

    Ok(token_data.claims.sub)
}
