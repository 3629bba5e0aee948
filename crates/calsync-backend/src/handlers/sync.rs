//! Calendar mapping handlers: manual sync, sync-state inspection and
//! enable/disable.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use calsync_types::{CalendarMappingResponse, SyncReport, SyncStateResponse};
use uuid::Uuid;

use super::owned_mapping;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::store::SyncStore;
use crate::sync::state::{derive_status, CursorState};
use crate::AppState;

/// Run a sync pass now. Waits for a pass already running on the same
/// mapping to finish first.
pub async fn trigger_sync(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(mapping_id): Path<Uuid>,
) -> ApiResult<Json<SyncReport>> {
    let mapping = owned_mapping(&state, &user, mapping_id).await?;
    let report = state.engine.sync_mapping(mapping.id).await?;
    Ok(Json(report))
}

pub async fn get_sync_state(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(mapping_id): Path<Uuid>,
) -> ApiResult<Json<SyncStateResponse>> {
    let mapping = owned_mapping(&state, &user, mapping_id).await?;
    let stored = state.store.get_sync_state(mapping.id).await?;
    let in_flight = state.engine.is_syncing(mapping.id).await;

    let status = derive_status(
        stored.as_ref(),
        in_flight,
        mapping.last_sync_error.as_deref(),
    );
    let has_cursor = CursorState::from_row(stored.as_ref()).cursor().is_some();

    Ok(Json(SyncStateResponse {
        calendar_mapping_id: mapping.id,
        status,
        has_cursor,
        last_sync_at: stored.map(|s| s.last_sync_at),
        last_sync_error: mapping.last_sync_error,
    }))
}

/// Flip the mapping's sync-enabled flag.
pub async fn toggle_mapping(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(mapping_id): Path<Uuid>,
) -> ApiResult<Json<CalendarMappingResponse>> {
    let mapping = owned_mapping(&state, &user, mapping_id).await?;
    let updated = state
        .store
        .set_mapping_enabled(mapping.id, !mapping.sync_enabled)
        .await?;

    tracing::info!(
        mapping_id = %updated.id,
        sync_enabled = updated.sync_enabled,
        "Calendar mapping toggled"
    );
    Ok(Json(updated.into()))
}
