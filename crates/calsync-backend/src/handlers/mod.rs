//! HTTP handlers for the `/api` surface.

pub mod accounts;
pub mod sync;

use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::models::{CalendarMapping, ConnectedAccount};
use crate::store::SyncStore;
use crate::AppState;

/// Active account belonging to the caller. Accounts of other users are
/// reported as missing.
async fn owned_account(
    state: &AppState,
    user: &AuthUser,
    account_id: Uuid,
) -> ApiResult<ConnectedAccount> {
    state
        .store
        .get_connected_account(account_id)
        .await?
        .filter(|a| a.is_active && a.user_id == user.user_id)
        .ok_or_else(|| ApiError::not_found("Connected account"))
}

/// Calendar mapping whose account belongs to the caller.
async fn owned_mapping(
    state: &AppState,
    user: &AuthUser,
    mapping_id: Uuid,
) -> ApiResult<CalendarMapping> {
    let mapping = state
        .store
        .get_calendar_mapping(mapping_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Calendar mapping"))?;

    owned_account(state, user, mapping.connected_account_id)
        .await
        .map_err(|_| ApiError::not_found("Calendar mapping"))?;

    Ok(mapping)
}
