//! Persistence interface used by the sync engine and the HTTP layer.
//!
//! `SyncStore` is the single seam between sync logic and storage. The
//! PostgreSQL implementation delegates to the per-table functions in
//! `crate::db`; tests run against the in-memory implementation.

use anyhow::Result;
use async_trait::async_trait;
use calsync_types::LocalEventStatus;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    CalendarMapping, ConnectedAccount, EventMapping, LocalCalendar, LocalEvent, LocalEventFields,
    NewCalendarMapping, NewConnectedAccount, NewLocalCalendar, NewLocalEvent, SyncState,
};

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[cfg(test)]
pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait SyncStore: Send + Sync {
    // Connected accounts

    async fn get_connected_account(&self, id: Uuid) -> Result<Option<ConnectedAccount>>;

    async fn list_active_accounts(&self, user_id: Uuid) -> Result<Vec<ConnectedAccount>>;

    /// Insert, or replace the tokens of the active account with the same
    /// (user, provider, provider account id).
    async fn upsert_connected_account(
        &self,
        account: NewConnectedAccount,
    ) -> Result<ConnectedAccount>;

    /// Single-row credential update after a refresh. The refresh token is
    /// only replaced when the provider rotated it.
    async fn update_account_tokens(
        &self,
        id: Uuid,
        access_token: &str,
        expires_at: DateTime<Utc>,
        refresh_token: Option<&str>,
    ) -> Result<ConnectedAccount>;

    /// Mark the stored access token as expired so the next use refreshes it.
    async fn expire_access_token(&self, id: Uuid) -> Result<()>;

    async fn deactivate_account(&self, id: Uuid) -> Result<()>;

    // Local calendars and events

    async fn list_local_calendars(&self, user_id: Uuid) -> Result<Vec<LocalCalendar>>;

    async fn create_local_calendar(&self, calendar: NewLocalCalendar) -> Result<LocalCalendar>;

    async fn get_local_event(&self, id: Uuid) -> Result<Option<LocalEvent>>;

    /// Insert a local event together with the event mapping that links it
    /// to `provider_event_id`. Both rows are written or neither is.
    async fn create_local_event_with_mapping(
        &self,
        event: NewLocalEvent,
        calendar_mapping_id: Uuid,
        provider_event_id: &str,
        etag: Option<&str>,
        synced_at: DateTime<Utc>,
    ) -> Result<EventMapping>;

    async fn update_local_event(&self, id: Uuid, fields: &LocalEventFields) -> Result<()>;

    async fn set_local_event_status(&self, id: Uuid, status: LocalEventStatus) -> Result<()>;

    // Calendar mappings

    async fn get_calendar_mapping(&self, id: Uuid) -> Result<Option<CalendarMapping>>;

    async fn find_calendar_mapping(
        &self,
        account_id: Uuid,
        provider_calendar_id: &str,
    ) -> Result<Option<CalendarMapping>>;

    /// Returns `None` when a mapping for the same (account, provider
    /// calendar) already exists.
    async fn create_calendar_mapping(
        &self,
        mapping: NewCalendarMapping,
    ) -> Result<Option<CalendarMapping>>;

    async fn list_calendar_mappings(&self, account_id: Uuid) -> Result<Vec<CalendarMapping>>;

    /// Sync-enabled mappings of active accounts.
    async fn list_sync_enabled_mappings(&self) -> Result<Vec<CalendarMapping>>;

    /// Stamp a successful pass and clear the last recorded error.
    async fn mark_mapping_synced(&self, id: Uuid, synced_at: DateTime<Utc>) -> Result<()>;

    async fn record_mapping_error(&self, id: Uuid, error: &str) -> Result<()>;

    async fn set_mapping_enabled(&self, id: Uuid, enabled: bool) -> Result<CalendarMapping>;

    // Sync checkpoints

    async fn get_sync_state(&self, mapping_id: Uuid) -> Result<Option<SyncState>>;

    async fn upsert_sync_state(&self, state: SyncState) -> Result<()>;

    // Event mappings

    async fn get_event_mapping(
        &self,
        mapping_id: Uuid,
        provider_event_id: &str,
    ) -> Result<Option<EventMapping>>;

    async fn update_event_mapping(
        &self,
        id: Uuid,
        etag: Option<&str>,
        synced_at: DateTime<Utc>,
    ) -> Result<()>;
}
