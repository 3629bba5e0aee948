use anyhow::{Context, Result};
use async_trait::async_trait;
use calsync_types::LocalEventStatus;
use chrono::{DateTime, Utc};
use diesel_async::{pooled_connection::deadpool::Object, AsyncPgConnection};
use uuid::Uuid;

use super::SyncStore;
use crate::db::{self, DbPool};
use crate::models::{
    CalendarMapping, ConnectedAccount, EventMapping, LocalCalendar, LocalEvent, LocalEventFields,
    NewCalendarMapping, NewConnectedAccount, NewLocalCalendar, NewLocalEvent, SyncState,
};

/// `SyncStore` backed by PostgreSQL through the shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<Object<AsyncPgConnection>> {
        self.pool
            .get()
            .await
            .context("Failed to get database connection from pool")
    }
}

#[async_trait]
impl SyncStore for PgStore {
    async fn get_connected_account(&self, id: Uuid) -> Result<Option<ConnectedAccount>> {
        let mut conn = self.conn().await?;
        db::connected_accounts::get_by_id(&mut conn, id).await
    }

    async fn list_active_accounts(&self, user_id: Uuid) -> Result<Vec<ConnectedAccount>> {
        let mut conn = self.conn().await?;
        db::connected_accounts::list_active_for_user(&mut conn, user_id).await
    }

    async fn upsert_connected_account(
        &self,
        account: NewConnectedAccount,
    ) -> Result<ConnectedAccount> {
        let mut conn = self.conn().await?;
        db::connected_accounts::upsert_active(&mut conn, account).await
    }

    async fn update_account_tokens(
        &self,
        id: Uuid,
        access_token: &str,
        expires_at: DateTime<Utc>,
        refresh_token: Option<&str>,
    ) -> Result<ConnectedAccount> {
        let mut conn = self.conn().await?;
        db::connected_accounts::update_tokens(&mut conn, id, access_token, expires_at, refresh_token)
            .await
    }

    async fn expire_access_token(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn().await?;
        db::connected_accounts::expire_access_token(&mut conn, id).await
    }

    async fn deactivate_account(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn().await?;
        db::connected_accounts::deactivate(&mut conn, id).await
    }

    async fn list_local_calendars(&self, user_id: Uuid) -> Result<Vec<LocalCalendar>> {
        let mut conn = self.conn().await?;
        db::calendars::list_for_user(&mut conn, user_id).await
    }

    async fn create_local_calendar(&self, calendar: NewLocalCalendar) -> Result<LocalCalendar> {
        let mut conn = self.conn().await?;
        db::calendars::create(&mut conn, calendar).await
    }

    async fn get_local_event(&self, id: Uuid) -> Result<Option<LocalEvent>> {
        let mut conn = self.conn().await?;
        db::events::get_by_id(&mut conn, id).await
    }

    async fn create_local_event_with_mapping(
        &self,
        event: NewLocalEvent,
        calendar_mapping_id: Uuid,
        provider_event_id: &str,
        etag: Option<&str>,
        synced_at: DateTime<Utc>,
    ) -> Result<EventMapping> {
        let mut conn = self.conn().await?;
        db::event_mappings::create_with_event(
            &mut conn,
            event,
            calendar_mapping_id,
            provider_event_id.to_string(),
            etag.map(str::to_string),
            synced_at,
        )
        .await
    }

    async fn update_local_event(&self, id: Uuid, fields: &LocalEventFields) -> Result<()> {
        let mut conn = self.conn().await?;
        db::events::update_fields(&mut conn, id, fields).await
    }

    async fn set_local_event_status(&self, id: Uuid, status: LocalEventStatus) -> Result<()> {
        let mut conn = self.conn().await?;
        db::events::set_status(&mut conn, id, status.as_str()).await
    }

    async fn get_calendar_mapping(&self, id: Uuid) -> Result<Option<CalendarMapping>> {
        let mut conn = self.conn().await?;
        db::calendar_mappings::get_by_id(&mut conn, id).await
    }

    async fn find_calendar_mapping(
        &self,
        account_id: Uuid,
        provider_calendar_id: &str,
    ) -> Result<Option<CalendarMapping>> {
        let mut conn = self.conn().await?;
        db::calendar_mappings::find_by_provider_id(&mut conn, account_id, provider_calendar_id)
            .await
    }

    async fn create_calendar_mapping(
        &self,
        mapping: NewCalendarMapping,
    ) -> Result<Option<CalendarMapping>> {
        let mut conn = self.conn().await?;
        db::calendar_mappings::create_if_absent(&mut conn, mapping).await
    }

    async fn list_calendar_mappings(&self, account_id: Uuid) -> Result<Vec<CalendarMapping>> {
        let mut conn = self.conn().await?;
        db::calendar_mappings::list_for_account(&mut conn, account_id).await
    }

    async fn list_sync_enabled_mappings(&self) -> Result<Vec<CalendarMapping>> {
        let mut conn = self.conn().await?;
        db::calendar_mappings::list_sync_enabled(&mut conn).await
    }

    async fn mark_mapping_synced(&self, id: Uuid, synced_at: DateTime<Utc>) -> Result<()> {
        let mut conn = self.conn().await?;
        db::calendar_mappings::mark_synced(&mut conn, id, synced_at).await
    }

    async fn record_mapping_error(&self, id: Uuid, error: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        db::calendar_mappings::record_error(&mut conn, id, error).await
    }

    async fn set_mapping_enabled(&self, id: Uuid, enabled: bool) -> Result<CalendarMapping> {
        let mut conn = self.conn().await?;
        db::calendar_mappings::set_enabled(&mut conn, id, enabled).await
    }

    async fn get_sync_state(&self, mapping_id: Uuid) -> Result<Option<SyncState>> {
        let mut conn = self.conn().await?;
        db::sync_states::get(&mut conn, mapping_id).await
    }

    async fn upsert_sync_state(&self, state: SyncState) -> Result<()> {
        let mut conn = self.conn().await?;
        db::sync_states::upsert(&mut conn, &state).await
    }

    async fn get_event_mapping(
        &self,
        mapping_id: Uuid,
        provider_event_id: &str,
    ) -> Result<Option<EventMapping>> {
        let mut conn = self.conn().await?;
        db::event_mappings::get(&mut conn, mapping_id, provider_event_id).await
    }

    async fn update_event_mapping(
        &self,
        id: Uuid,
        etag: Option<&str>,
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = self.conn().await?;
        db::event_mappings::update_version(&mut conn, id, etag, synced_at).await
    }
}
