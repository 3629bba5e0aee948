//! Authentication middleware layer for protecting routes.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::AppState;

use super::jwt;
use super::types::AuthUser;

/// Middleware function that requires authentication.
///
/// Accepts the session token from the auth cookie or an `Authorization:
/// Bearer` header and makes the caller available to handlers as an
/// `Extension<AuthUser>`. Used with `axum::middleware::from_fn_with_state`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let config = &state.auth_config;

    // Try to get token from cookie first, then Authorization header
    let token = extract_token_from_cookie(request.headers(), &config.cookie_name)
        .or_else(|| extract_token_from_header(request.headers()));

    let Some(token) = token else {
        return ApiError::unauthorized("Missing authentication").into_response();
    };

    let claims = match jwt::validate_token(config, &token) {
        Ok(c) => c,
        Err(_) => {
            return ApiError::unauthorized("Invalid or expired token").into_response();
        }
    };

    request.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
        email: claims.email.clone(),
    });

    let response = next.run(request).await;

    // Sliding session: re-issue day-old tokens
    if jwt::should_refresh(&claims) {
        if let Ok(new_token) = jwt::create_token(config, claims.sub, claims.email.clone()) {
            let cookie =
                build_auth_cookie(&config.cookie_name, &new_token, config.token_duration_days);
            let (mut parts, body) = response.into_parts();
            if let Ok(cookie_value) = cookie.parse() {
                parts.headers.insert(header::SET_COOKIE, cookie_value);
            }
            return Response::from_parts(parts, body);
        }
    }

    response
}

fn extract_token_from_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;

    for cookie_str in cookie_header.split(';') {
        if let Ok(cookie) = cookie::Cookie::parse(cookie_str.trim()) {
            if cookie.name() == cookie_name {
                return Some(cookie.value().to_string());
            }
        }
    }

    None
}

fn extract_token_from_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|s| s.to_string())
}

/// Build an auth cookie string.
pub fn build_auth_cookie(name: &str, value: &str, days: i64) -> String {
    let max_age = days * 24 * 60 * 60;
    let secure = if std::env::var("RUST_ENV").unwrap_or_default() == "production" {
        "; Secure"
    } else {
        ""
    };
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        name, value, max_age, secure
    )
}
