//! Unified error handling for the backend API.
//!
//! Handlers return `ApiResult<T>` and use `?` freely; the conversion into an
//! HTTP response picks the status code and the machine-readable `reason`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use calsync_types::ErrorResponse;
use thiserror::Error;

use crate::provider::ProviderError;
use crate::sync::SyncError;

/// Unified error type for API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication required but not provided or invalid
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource missing, or owned by another user
    #[error("{0} not found")]
    NotFound(String),

    /// The connected account must be authorized again
    #[error("Re-authorization required: {0}")]
    ReauthorizationRequired(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Persistence failure
    #[error("{0}")]
    Storage(#[from] anyhow::Error),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Environment variable missing or unusable
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        ApiError::NotFound(resource.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    /// HTTP status, machine-readable reason and retry hint for this error.
    pub fn classify(&self) -> (StatusCode, &'static str, bool) {
        match self {
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized", false),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", false),
            ApiError::ReauthorizationRequired(_) => {
                (StatusCode::CONFLICT, "reauthorization_required", false)
            }
            ApiError::Provider(e) if e.is_retryable() => {
                (StatusCode::BAD_GATEWAY, "provider_unavailable", true)
            }
            ApiError::Provider(_) => (StatusCode::BAD_GATEWAY, "provider_rejected", false),
            ApiError::Storage(_) => (StatusCode::SERVICE_UNAVAILABLE, "storage_error", true),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", false),
            ApiError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                false,
            ),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::NotFound(what) => ApiError::NotFound(what),
            SyncError::CredentialRefresh { reason, .. } => {
                ApiError::ReauthorizationRequired(reason)
            }
            SyncError::Provider(e) => ApiError::Provider(e),
            SyncError::Store(e) => ApiError::Storage(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, reason, retryable) = self.classify();

        let (error_message, details) = match &self {
            ApiError::Storage(e) => {
                tracing::error!("Storage error: {:?}", e);
                ("Storage temporarily unavailable".to_string(), None)
            }
            ApiError::Provider(e) => {
                tracing::warn!("Provider error: {}", e);
                (
                    "Calendar provider request failed".to_string(),
                    Some(e.to_string()),
                )
            }
            ApiError::ReauthorizationRequired(reason) => {
                tracing::warn!("Credential refresh failed: {}", reason);
                (
                    "Connected account must be re-authorized".to_string(),
                    None,
                )
            }
            ApiError::Config(msg) => {
                tracing::error!("Configuration error: {}", msg);
                ("Server configuration error".to_string(), None)
            }
            ApiError::NotFound(resource) => (format!("{} not found", resource), None),
            ApiError::Unauthorized(msg) | ApiError::BadRequest(msg) => (msg.clone(), None),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            reason: reason.to_string(),
            retryable,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
