//! In-memory `SyncStore` for tests, with simple failure injection.

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use calsync_types::LocalEventStatus;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::SyncStore;
use crate::models::{
    CalendarMapping, ConnectedAccount, EventMapping, LocalCalendar, LocalEvent, LocalEventFields,
    NewCalendarMapping, NewConnectedAccount, NewLocalCalendar, NewLocalEvent, SyncState,
};

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, ConnectedAccount>,
    calendars: HashMap<Uuid, LocalCalendar>,
    events: HashMap<Uuid, LocalEvent>,
    mappings: HashMap<Uuid, CalendarMapping>,
    sync_states: HashMap<Uuid, SyncState>,
    event_mappings: HashMap<Uuid, EventMapping>,
    token_updates: usize,
    fail_calendar_names: HashSet<String>,
    fail_event_titles: HashSet<String>,
    fail_next_event_mapping: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create_local_calendar` fail for calendars with this name.
    pub async fn fail_calendar_named(&self, name: &str) {
        self.tables
            .lock()
            .await
            .fail_calendar_names
            .insert(name.to_string());
    }

    /// Make local event writes fail for events with this title.
    pub async fn fail_event_titled(&self, title: &str) {
        self.tables
            .lock()
            .await
            .fail_event_titles
            .insert(title.to_string());
    }

    /// Make the next event mapping insert fail. The paired local event is
    /// not written either.
    pub async fn fail_next_event_mapping(&self) {
        self.tables.lock().await.fail_next_event_mapping = true;
    }

    pub async fn insert_account(&self, account: ConnectedAccount) {
        self.tables.lock().await.accounts.insert(account.id, account);
    }

    pub async fn insert_mapping(&self, mapping: CalendarMapping) {
        self.tables.lock().await.mappings.insert(mapping.id, mapping);
    }

    pub async fn token_update_count(&self) -> usize {
        self.tables.lock().await.token_updates
    }

    pub async fn events_in_calendar(&self, calendar_id: Uuid) -> Vec<LocalEvent> {
        let tables = self.tables.lock().await;
        let mut events: Vec<LocalEvent> = tables
            .events
            .values()
            .filter(|e| e.calendar_id == calendar_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.created_at);
        events
    }

    pub async fn event_mappings_for(&self, mapping_id: Uuid) -> Vec<EventMapping> {
        let tables = self.tables.lock().await;
        tables
            .event_mappings
            .values()
            .filter(|m| m.calendar_mapping_id == mapping_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn get_connected_account(&self, id: Uuid) -> Result<Option<ConnectedAccount>> {
        Ok(self.tables.lock().await.accounts.get(&id).cloned())
    }

    async fn list_active_accounts(&self, user_id: Uuid) -> Result<Vec<ConnectedAccount>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .accounts
            .values()
            .filter(|a| a.user_id == user_id && a.is_active)
            .cloned()
            .collect())
    }

    async fn upsert_connected_account(
        &self,
        account: NewConnectedAccount,
    ) -> Result<ConnectedAccount> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        let existing = tables.accounts.values_mut().find(|a| {
            a.is_active
                && a.user_id == account.user_id
                && a.provider == account.provider
                && a.provider_account_id == account.provider_account_id
        });

        if let Some(current) = existing {
            if account.refresh_token.is_some() {
                current.refresh_token = account.refresh_token;
            }
            current.access_token = account.access_token;
            current.token_expires_at = account.token_expires_at;
            current.scope = account.scope;
            current.updated_at = now;
            return Ok(current.clone());
        }

        let row = ConnectedAccount {
            id: Uuid::new_v4(),
            user_id: account.user_id,
            provider: account.provider,
            provider_account_id: account.provider_account_id,
            access_token: account.access_token,
            refresh_token: account.refresh_token,
            token_expires_at: account.token_expires_at,
            scope: account.scope,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.accounts.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_account_tokens(
        &self,
        id: Uuid,
        access_token: &str,
        expires_at: DateTime<Utc>,
        refresh_token: Option<&str>,
    ) -> Result<ConnectedAccount> {
        let mut tables = self.tables.lock().await;
        tables.token_updates += 1;
        let account = tables
            .accounts
            .get_mut(&id)
            .ok_or_else(|| anyhow!("account {} not found", id))?;
        account.access_token = Some(access_token.to_string());
        account.token_expires_at = Some(expires_at);
        if let Some(refresh) = refresh_token {
            account.refresh_token = Some(refresh.to_string());
        }
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn expire_access_token(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let account = tables
            .accounts
            .get_mut(&id)
            .ok_or_else(|| anyhow!("account {} not found", id))?;
        account.token_expires_at = Some(Utc::now());
        Ok(())
    }

    async fn deactivate_account(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if let Some(account) = tables.accounts.get_mut(&id) {
            account.is_active = false;
        }
        Ok(())
    }

    async fn list_local_calendars(&self, user_id: Uuid) -> Result<Vec<LocalCalendar>> {
        let tables = self.tables.lock().await;
        let mut calendars: Vec<LocalCalendar> = tables
            .calendars
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        calendars.sort_by_key(|c| c.created_at);
        Ok(calendars)
    }

    async fn create_local_calendar(&self, calendar: NewLocalCalendar) -> Result<LocalCalendar> {
        let mut tables = self.tables.lock().await;
        if tables.fail_calendar_names.contains(&calendar.name) {
            bail!("injected failure creating calendar {}", calendar.name);
        }
        let row = LocalCalendar {
            id: Uuid::new_v4(),
            user_id: calendar.user_id,
            name: calendar.name,
            color: calendar.color,
            description: calendar.description,
            created_at: Utc::now(),
        };
        tables.calendars.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_local_event(&self, id: Uuid) -> Result<Option<LocalEvent>> {
        Ok(self.tables.lock().await.events.get(&id).cloned())
    }

    async fn create_local_event_with_mapping(
        &self,
        event: NewLocalEvent,
        calendar_mapping_id: Uuid,
        provider_event_id: &str,
        etag: Option<&str>,
        synced_at: DateTime<Utc>,
    ) -> Result<EventMapping> {
        let mut tables = self.tables.lock().await;
        if tables.fail_event_titles.contains(&event.title) {
            bail!("injected failure writing event {}", event.title);
        }
        if std::mem::take(&mut tables.fail_next_event_mapping) {
            bail!("injected failure writing event mapping for {}", provider_event_id);
        }
        let duplicate = tables.event_mappings.values().any(|m| {
            m.calendar_mapping_id == calendar_mapping_id && m.provider_event_id == provider_event_id
        });
        if duplicate {
            bail!("duplicate event mapping for provider event {}", provider_event_id);
        }

        let now = Utc::now();
        let row = LocalEvent {
            id: Uuid::new_v4(),
            calendar_id: event.calendar_id,
            title: event.title,
            description: event.description,
            start_time: event.start_time,
            end_time: event.end_time,
            timezone: event.timezone,
            status: event.status,
            created_at: now,
            updated_at: now,
        };
        let link = EventMapping {
            id: Uuid::new_v4(),
            calendar_mapping_id,
            local_event_id: row.id,
            provider_event_id: provider_event_id.to_string(),
            provider_etag: etag.map(str::to_string),
            last_synced_at: synced_at,
        };
        tables.events.insert(row.id, row);
        tables.event_mappings.insert(link.id, link.clone());
        Ok(link)
    }

    async fn update_local_event(&self, id: Uuid, fields: &LocalEventFields) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if tables.fail_event_titles.contains(&fields.title) {
            bail!("injected failure writing event {}", fields.title);
        }
        let event = tables
            .events
            .get_mut(&id)
            .ok_or_else(|| anyhow!("event {} not found", id))?;
        event.title = fields.title.clone();
        event.description = fields.description.clone();
        event.start_time = fields.start_time;
        event.end_time = fields.end_time;
        event.timezone = fields.timezone.clone();
        event.status = fields.status.clone();
        event.updated_at = Utc::now();
        Ok(())
    }

    async fn set_local_event_status(&self, id: Uuid, status: LocalEventStatus) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let event = tables
            .events
            .get_mut(&id)
            .ok_or_else(|| anyhow!("event {} not found", id))?;
        event.status = status.as_str().to_string();
        event.updated_at = Utc::now();
        Ok(())
    }

    async fn get_calendar_mapping(&self, id: Uuid) -> Result<Option<CalendarMapping>> {
        Ok(self.tables.lock().await.mappings.get(&id).cloned())
    }

    async fn find_calendar_mapping(
        &self,
        account_id: Uuid,
        provider_calendar_id: &str,
    ) -> Result<Option<CalendarMapping>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .mappings
            .values()
            .find(|m| {
                m.connected_account_id == account_id
                    && m.provider_calendar_id == provider_calendar_id
            })
            .cloned())
    }

    async fn create_calendar_mapping(
        &self,
        mapping: NewCalendarMapping,
    ) -> Result<Option<CalendarMapping>> {
        let mut tables = self.tables.lock().await;
        let taken = tables.mappings.values().any(|m| {
            m.connected_account_id == mapping.connected_account_id
                && m.provider_calendar_id == mapping.provider_calendar_id
        });
        if taken {
            return Ok(None);
        }
        let row = CalendarMapping {
            id: Uuid::new_v4(),
            connected_account_id: mapping.connected_account_id,
            local_calendar_id: mapping.local_calendar_id,
            provider_calendar_id: mapping.provider_calendar_id,
            provider_calendar_name: mapping.provider_calendar_name,
            sync_enabled: mapping.sync_enabled,
            sync_direction: mapping.sync_direction,
            last_synced_at: None,
            last_sync_error: None,
            created_at: Utc::now(),
        };
        tables.mappings.insert(row.id, row.clone());
        Ok(Some(row))
    }

    async fn list_calendar_mappings(&self, account_id: Uuid) -> Result<Vec<CalendarMapping>> {
        let tables = self.tables.lock().await;
        let mut mappings: Vec<CalendarMapping> = tables
            .mappings
            .values()
            .filter(|m| m.connected_account_id == account_id)
            .cloned()
            .collect();
        mappings.sort_by(|a, b| a.provider_calendar_name.cmp(&b.provider_calendar_name));
        Ok(mappings)
    }

    async fn list_sync_enabled_mappings(&self) -> Result<Vec<CalendarMapping>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .mappings
            .values()
            .filter(|m| m.sync_enabled)
            .filter(|m| {
                tables
                    .accounts
                    .get(&m.connected_account_id)
                    .map(|a| a.is_active)
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn mark_mapping_synced(&self, id: Uuid, synced_at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if let Some(mapping) = tables.mappings.get_mut(&id) {
            mapping.last_synced_at = Some(synced_at);
            mapping.last_sync_error = None;
        }
        Ok(())
    }

    async fn record_mapping_error(&self, id: Uuid, error: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if let Some(mapping) = tables.mappings.get_mut(&id) {
            mapping.last_sync_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn set_mapping_enabled(&self, id: Uuid, enabled: bool) -> Result<CalendarMapping> {
        let mut tables = self.tables.lock().await;
        let mapping = tables
            .mappings
            .get_mut(&id)
            .ok_or_else(|| anyhow!("mapping {} not found", id))?;
        mapping.sync_enabled = enabled;
        Ok(mapping.clone())
    }

    async fn get_sync_state(&self, mapping_id: Uuid) -> Result<Option<SyncState>> {
        Ok(self.tables.lock().await.sync_states.get(&mapping_id).cloned())
    }

    async fn upsert_sync_state(&self, state: SyncState) -> Result<()> {
        self.tables
            .lock()
            .await
            .sync_states
            .insert(state.calendar_mapping_id, state);
        Ok(())
    }

    async fn get_event_mapping(
        &self,
        mapping_id: Uuid,
        provider_event_id: &str,
    ) -> Result<Option<EventMapping>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .event_mappings
            .values()
            .find(|m| m.calendar_mapping_id == mapping_id && m.provider_event_id == provider_event_id)
            .cloned())
    }

    async fn update_event_mapping(
        &self,
        id: Uuid,
        etag: Option<&str>,
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let mapping = tables
            .event_mappings
            .get_mut(&id)
            .ok_or_else(|| anyhow!("event mapping {} not found", id))?;
        mapping.provider_etag = etag.map(str::to_string);
        mapping.last_synced_at = synced_at;
        Ok(())
    }
}
