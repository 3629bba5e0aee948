// Database models for Diesel
use calsync_types::{CalendarMappingResponse, ConnectedAccountResponse, SyncDirection};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::fmt;
use uuid::Uuid;

/// One authorized external account belonging to a local user.
#[derive(Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::connected_accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ConnectedAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub provider_account_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Token material stays out of logs
impl fmt::Debug for ConnectedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectedAccount")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("provider", &self.provider)
            .field("provider_account_id", &self.provider_account_id)
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("token_expires_at", &self.token_expires_at)
            .field("is_active", &self.is_active)
            .finish()
    }
}

impl From<ConnectedAccount> for ConnectedAccountResponse {
    fn from(account: ConnectedAccount) -> Self {
        ConnectedAccountResponse {
            id: account.id,
            provider: account.provider,
            provider_account_id: account.provider_account_id,
            scope: account.scope,
            token_expires_at: account.token_expires_at,
            is_active: account.is_active,
            created_at: account.created_at,
        }
    }
}

/// Values written when an OAuth exchange completes
#[derive(Clone, Insertable)]
#[diesel(table_name = crate::schema::connected_accounts)]
pub struct NewConnectedAccount {
    pub user_id: Uuid,
    pub provider: String,
    pub provider_account_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::calendars)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LocalCalendar {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::calendars)]
pub struct NewLocalCalendar {
    pub user_id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LocalEvent {
    pub id: Uuid,
    pub calendar_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub timezone: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mutable fields of a local event, as owned by the provider side.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalEventFields {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub timezone: String,
    pub status: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::events)]
pub struct NewLocalEvent {
    pub calendar_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub timezone: String,
    pub status: String,
}

impl NewLocalEvent {
    pub fn from_fields(calendar_id: Uuid, fields: LocalEventFields) -> Self {
        NewLocalEvent {
            calendar_id,
            title: fields.title,
            description: fields.description,
            start_time: fields.start_time,
            end_time: fields.end_time,
            timezone: fields.timezone,
            status: fields.status,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::calendar_mappings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CalendarMapping {
    pub id: Uuid,
    pub connected_account_id: Uuid,
    pub local_calendar_id: Uuid,
    pub provider_calendar_id: String,
    pub provider_calendar_name: String,
    pub sync_enabled: bool,
    pub sync_direction: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_sync_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CalendarMapping> for CalendarMappingResponse {
    fn from(mapping: CalendarMapping) -> Self {
        CalendarMappingResponse {
            id: mapping.id,
            connected_account_id: mapping.connected_account_id,
            local_calendar_id: mapping.local_calendar_id,
            provider_calendar_id: mapping.provider_calendar_id,
            provider_calendar_name: mapping.provider_calendar_name,
            sync_enabled: mapping.sync_enabled,
            sync_direction: SyncDirection::from_str(&mapping.sync_direction)
                .unwrap_or(SyncDirection::Bidirectional),
            last_synced_at: mapping.last_synced_at,
            last_sync_error: mapping.last_sync_error,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::calendar_mappings)]
pub struct NewCalendarMapping {
    pub connected_account_id: Uuid,
    pub local_calendar_id: Uuid,
    pub provider_calendar_id: String,
    pub provider_calendar_name: String,
    pub sync_enabled: bool,
    pub sync_direction: String,
}

/// Sync checkpoint row; one per calendar mapping.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::sync_states)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SyncState {
    pub calendar_mapping_id: Uuid,
    pub sync_cursor: Option<String>,
    pub status: String,
    pub last_sync_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::event_mappings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EventMapping {
    pub id: Uuid,
    pub calendar_mapping_id: Uuid,
    pub local_event_id: Uuid,
    pub provider_event_id: String,
    pub provider_etag: Option<String>,
    pub last_synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::event_mappings)]
pub struct NewEventMapping {
    pub calendar_mapping_id: Uuid,
    pub local_event_id: Uuid,
    pub provider_event_id: String,
    pub provider_etag: Option<String>,
    pub last_synced_at: DateTime<Utc>,
}
