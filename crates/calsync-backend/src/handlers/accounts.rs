//! Connected account handlers: OAuth connection flow, listing, discovery
//! and disconnect.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use calsync_types::{
    CalendarMappingResponse, ConnectedAccountResponse, DiscoveryReport, OAuthStartResponse,
    GOOGLE_PROVIDER,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::owned_account;
use crate::auth::{jwt, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::models::NewConnectedAccount;
use crate::store::SyncStore;
use crate::AppState;

pub async fn list_connected_accounts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<ConnectedAccountResponse>>> {
    let accounts = state.store.list_active_accounts(user.user_id).await?;
    Ok(Json(accounts.into_iter().map(Into::into).collect()))
}

/// Step 1 of connecting an account: hand out the provider consent URL.
pub async fn start_oauth(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<OAuthStartResponse>> {
    let oauth_state = jwt::create_state_token(&state.auth_config, user.user_id)
        .map_err(|e| ApiError::Config(format!("Failed to sign OAuth state: {}", e)))?;

    Ok(Json(OAuthStartResponse {
        auth_url: state.provider.authorization_url(&oauth_state),
    }))
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Step 2: the provider redirects back here after consent.
///
/// Public route; the signed `state` identifies the user. Always answers
/// with a redirect so the browser lands back in the app.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<OAuthCallbackParams>,
) -> Response {
    match handle_callback_inner(&state, params).await {
        Ok(account_id) => {
            Redirect::to(&format!("/?calendar_connected={}", account_id)).into_response()
        }
        Err(e) => {
            tracing::error!("OAuth callback error: {}", e);
            let reason = match e {
                ApiError::Unauthorized(_) | ApiError::BadRequest(_) => "invalid_request",
                _ => "connect_failed",
            };
            Redirect::to(&format!("/?calendar_error={}", reason)).into_response()
        }
    }
}

async fn handle_callback_inner(state: &AppState, params: OAuthCallbackParams) -> ApiResult<Uuid> {
    if let Some(error) = params.error {
        return Err(ApiError::bad_request(format!("Consent denied: {}", error)));
    }

    let oauth_state = params
        .state
        .ok_or_else(|| ApiError::bad_request("Missing state"))?;
    let user_id = jwt::validate_state_token(&state.auth_config, &oauth_state)
        .map_err(|_| ApiError::unauthorized("Invalid or expired OAuth state"))?;

    let code = params
        .code
        .ok_or_else(|| ApiError::bad_request("Missing authorization code"))?;

    let grant = state.provider.exchange_authorization_code(&code).await?;
    let email = state.provider.account_identity(&grant.access_token).await?;

    tracing::info!(%user_id, "Connecting calendar account {}", email);

    let account = state
        .store
        .upsert_connected_account(NewConnectedAccount {
            user_id,
            provider: GOOGLE_PROVIDER.to_string(),
            provider_account_id: email,
            access_token: Some(grant.access_token),
            refresh_token: grant.refresh_token,
            token_expires_at: Some(Utc::now() + Duration::seconds(grant.expires_in)),
            scope: grant.scope,
        })
        .await?;

    if account.refresh_token.is_none() {
        tracing::warn!(
            account_id = %account.id,
            "No refresh token received - sync stops once the access token expires"
        );
    }

    // Mappings can also be created later through the discover endpoint
    if let Err(e) = state.discovery.discover_calendars(&account).await {
        tracing::warn!(account_id = %account.id, "Initial calendar discovery failed: {}", e);
    }

    Ok(account.id)
}

/// Soft-disconnect: the account is deactivated, never deleted.
pub async fn disconnect_account(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let account = owned_account(&state, &user, account_id).await?;
    state.store.deactivate_account(account.id).await?;

    tracing::info!(account_id = %account.id, "Connected account deactivated");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn discover_calendars(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<Json<DiscoveryReport>> {
    let account = owned_account(&state, &user, account_id).await?;
    let report = state.discovery.discover_calendars(&account).await?;
    Ok(Json(report))
}

pub async fn list_account_mappings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CalendarMappingResponse>>> {
    let account = owned_account(&state, &user, account_id).await?;
    let mappings = state.store.list_calendar_mappings(account.id).await?;
    Ok(Json(mappings.into_iter().map(Into::into).collect()))
}
