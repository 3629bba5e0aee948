use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager, ManagerConfig},
    scoped_futures::ScopedFutureExt,
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
};
use uuid::Uuid;

use crate::models::{
    CalendarMapping, ConnectedAccount, EventMapping, LocalCalendar, LocalEvent, LocalEventFields,
    NewCalendarMapping, NewConnectedAccount, NewEventMapping, NewLocalCalendar, NewLocalEvent,
    SyncState,
};

pub type DbPool = Pool<AsyncPgConnection>;

async fn establish_tls_connection(config: String) -> diesel::ConnectionResult<AsyncPgConnection> {
    // Set up rustls TLS configuration
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

    let (client, connection) = tokio_postgres::connect(&config, tls)
        .await
        .map_err(|e| diesel::ConnectionError::BadConnection(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    AsyncPgConnection::try_from(client).await
}

pub fn establish_connection_pool(database_url: &str) -> anyhow::Result<DbPool> {
    let mut manager_config = ManagerConfig::default();
    manager_config.custom_setup =
        Box::new(|url| Box::pin(establish_tls_connection(url.to_string())));

    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_config(
        database_url,
        manager_config,
    );
    let pool = Pool::builder(config).build()?;

    Ok(pool)
}

// Connected account (credential store) operations
pub mod connected_accounts {
    use super::*;

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        account_id: Uuid,
    ) -> anyhow::Result<Option<ConnectedAccount>> {
        use crate::schema::connected_accounts::dsl::*;

        let account = connected_accounts
            .filter(id.eq(account_id))
            .select(ConnectedAccount::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(account)
    }

    pub async fn list_active_for_user(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
    ) -> anyhow::Result<Vec<ConnectedAccount>> {
        use crate::schema::connected_accounts::dsl::*;

        let accounts = connected_accounts
            .filter(user_id.eq(owner))
            .filter(is_active.eq(true))
            .order_by(created_at.desc())
            .select(ConnectedAccount::as_select())
            .load(conn)
            .await?;

        Ok(accounts)
    }

    /// Insert a new active account, or replace the tokens of the active
    /// account already registered for the same (user, provider, provider id).
    pub async fn upsert_active(
        conn: &mut AsyncPgConnection,
        new_account: NewConnectedAccount,
    ) -> anyhow::Result<ConnectedAccount> {
        use crate::schema::connected_accounts::dsl::*;

        let existing = connected_accounts
            .filter(user_id.eq(new_account.user_id))
            .filter(provider.eq(&new_account.provider))
            .filter(provider_account_id.eq(&new_account.provider_account_id))
            .filter(is_active.eq(true))
            .select(ConnectedAccount::as_select())
            .first(conn)
            .await
            .optional()?;

        let account = match existing {
            Some(current) => {
                // The provider only returns a refresh token on first consent
                let kept_refresh = new_account.refresh_token.or(current.refresh_token);

                diesel::update(connected_accounts.filter(id.eq(current.id)))
                    .set((
                        access_token.eq(new_account.access_token),
                        refresh_token.eq(kept_refresh),
                        token_expires_at.eq(new_account.token_expires_at),
                        scope.eq(new_account.scope),
                        updated_at.eq(Utc::now()),
                    ))
                    .returning(ConnectedAccount::as_returning())
                    .get_result(conn)
                    .await?
            }
            None => {
                diesel::insert_into(connected_accounts)
                    .values(&new_account)
                    .returning(ConnectedAccount::as_returning())
                    .get_result(conn)
                    .await?
            }
        };

        Ok(account)
    }

    pub async fn update_tokens(
        conn: &mut AsyncPgConnection,
        account_id: Uuid,
        new_access_token: &str,
        expires_at: DateTime<Utc>,
        rotated_refresh_token: Option<&str>,
    ) -> anyhow::Result<ConnectedAccount> {
        use crate::schema::connected_accounts::dsl::*;

        let target = connected_accounts.filter(id.eq(account_id));
        let now = Utc::now();

        let updated = match rotated_refresh_token {
            Some(new_refresh) => {
                diesel::update(target)
                    .set((
                        access_token.eq(Some(new_access_token)),
                        refresh_token.eq(Some(new_refresh)),
                        token_expires_at.eq(Some(expires_at)),
                        updated_at.eq(now),
                    ))
                    .returning(ConnectedAccount::as_returning())
                    .get_result(conn)
                    .await?
            }
            None => {
                diesel::update(target)
                    .set((
                        access_token.eq(Some(new_access_token)),
                        token_expires_at.eq(Some(expires_at)),
                        updated_at.eq(now),
                    ))
                    .returning(ConnectedAccount::as_returning())
                    .get_result(conn)
                    .await?
            }
        };

        Ok(updated)
    }

    pub async fn expire_access_token(
        conn: &mut AsyncPgConnection,
        account_id: Uuid,
    ) -> anyhow::Result<()> {
        use crate::schema::connected_accounts::dsl::*;

        let now = Utc::now();
        diesel::update(connected_accounts.filter(id.eq(account_id)))
            .set((token_expires_at.eq(Some(now)), updated_at.eq(now)))
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn deactivate(conn: &mut AsyncPgConnection, account_id: Uuid) -> anyhow::Result<()> {
        use crate::schema::connected_accounts::dsl::*;

        diesel::update(connected_accounts.filter(id.eq(account_id)))
            .set((is_active.eq(false), updated_at.eq(Utc::now())))
            .execute(conn)
            .await?;

        Ok(())
    }
}

// Local calendar operations
pub mod calendars {
    use super::*;

    pub async fn list_for_user(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
    ) -> anyhow::Result<Vec<LocalCalendar>> {
        use crate::schema::calendars::dsl::*;

        let items = calendars
            .filter(user_id.eq(owner))
            .order_by(created_at.asc())
            .select(LocalCalendar::as_select())
            .load(conn)
            .await?;

        Ok(items)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_calendar: NewLocalCalendar,
    ) -> anyhow::Result<LocalCalendar> {
        use crate::schema::calendars::dsl::*;

        let calendar = diesel::insert_into(calendars)
            .values(&new_calendar)
            .returning(LocalCalendar::as_returning())
            .get_result(conn)
            .await?;

        Ok(calendar)
    }
}

// Local event operations
pub mod events {
    use super::*;

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        event_id: Uuid,
    ) -> anyhow::Result<Option<LocalEvent>> {
        use crate::schema::events::dsl::*;

        let event = events
            .filter(id.eq(event_id))
            .select(LocalEvent::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(event)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_event: NewLocalEvent,
    ) -> anyhow::Result<LocalEvent> {
        use crate::schema::events::dsl::*;

        let event = diesel::insert_into(events)
            .values(&new_event)
            .returning(LocalEvent::as_returning())
            .get_result(conn)
            .await?;

        Ok(event)
    }

    pub async fn update_fields(
        conn: &mut AsyncPgConnection,
        event_id: Uuid,
        fields: &LocalEventFields,
    ) -> anyhow::Result<()> {
        use crate::schema::events::dsl::*;

        diesel::update(events.filter(id.eq(event_id)))
            .set((
                title.eq(&fields.title),
                description.eq(fields.description.as_deref()),
                start_time.eq(fields.start_time),
                end_time.eq(fields.end_time),
                timezone.eq(&fields.timezone),
                status.eq(&fields.status),
                updated_at.eq(Utc::now()),
            ))
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn set_status(
        conn: &mut AsyncPgConnection,
        event_id: Uuid,
        status_val: &str,
    ) -> anyhow::Result<()> {
        use crate::schema::events::dsl::*;

        diesel::update(events.filter(id.eq(event_id)))
            .set((status.eq(status_val), updated_at.eq(Utc::now())))
            .execute(conn)
            .await?;

        Ok(())
    }
}

// Calendar mapping operations
pub mod calendar_mappings {
    use super::*;

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        mapping_id: Uuid,
    ) -> anyhow::Result<Option<CalendarMapping>> {
        use crate::schema::calendar_mappings::dsl::*;

        let mapping = calendar_mappings
            .filter(id.eq(mapping_id))
            .select(CalendarMapping::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(mapping)
    }

    pub async fn find_by_provider_id(
        conn: &mut AsyncPgConnection,
        account_id: Uuid,
        provider_id: &str,
    ) -> anyhow::Result<Option<CalendarMapping>> {
        use crate::schema::calendar_mappings::dsl::*;

        let mapping = calendar_mappings
            .filter(connected_account_id.eq(account_id))
            .filter(provider_calendar_id.eq(provider_id))
            .select(CalendarMapping::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(mapping)
    }

    /// Insert a mapping unless one already exists for the same
    /// (account, provider calendar). Returns `None` on conflict.
    pub async fn create_if_absent(
        conn: &mut AsyncPgConnection,
        new_mapping: NewCalendarMapping,
    ) -> anyhow::Result<Option<CalendarMapping>> {
        use crate::schema::calendar_mappings::dsl::*;

        let mapping = diesel::insert_into(calendar_mappings)
            .values(&new_mapping)
            .on_conflict((connected_account_id, provider_calendar_id))
            .do_nothing()
            .returning(CalendarMapping::as_returning())
            .get_result(conn)
            .await
            .optional()?;

        Ok(mapping)
    }

    pub async fn list_for_account(
        conn: &mut AsyncPgConnection,
        account_id: Uuid,
    ) -> anyhow::Result<Vec<CalendarMapping>> {
        use crate::schema::calendar_mappings::dsl::*;

        let items = calendar_mappings
            .filter(connected_account_id.eq(account_id))
            .order_by(provider_calendar_name.asc())
            .select(CalendarMapping::as_select())
            .load(conn)
            .await?;

        Ok(items)
    }

    /// Sync-enabled mappings whose connected account is still active.
    pub async fn list_sync_enabled(
        conn: &mut AsyncPgConnection,
    ) -> anyhow::Result<Vec<CalendarMapping>> {
        use crate::schema::{calendar_mappings, connected_accounts};

        let items = calendar_mappings::table
            .inner_join(connected_accounts::table)
            .filter(calendar_mappings::sync_enabled.eq(true))
            .filter(connected_accounts::is_active.eq(true))
            .order_by(calendar_mappings::last_synced_at.asc().nulls_first())
            .select(CalendarMapping::as_select())
            .load(conn)
            .await?;

        Ok(items)
    }

    pub async fn mark_synced(
        conn: &mut AsyncPgConnection,
        mapping_id: Uuid,
        synced_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        use crate::schema::calendar_mappings::dsl::*;

        diesel::update(calendar_mappings.filter(id.eq(mapping_id)))
            .set((
                last_synced_at.eq(Some(synced_at)),
                last_sync_error.eq(None::<String>),
            ))
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn record_error(
        conn: &mut AsyncPgConnection,
        mapping_id: Uuid,
        error: &str,
    ) -> anyhow::Result<()> {
        use crate::schema::calendar_mappings::dsl::*;

        diesel::update(calendar_mappings.filter(id.eq(mapping_id)))
            .set(last_sync_error.eq(Some(error)))
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn set_enabled(
        conn: &mut AsyncPgConnection,
        mapping_id: Uuid,
        enabled: bool,
    ) -> anyhow::Result<CalendarMapping> {
        use crate::schema::calendar_mappings::dsl::*;

        let updated = diesel::update(calendar_mappings.filter(id.eq(mapping_id)))
            .set(sync_enabled.eq(enabled))
            .returning(CalendarMapping::as_returning())
            .get_result(conn)
            .await?;

        Ok(updated)
    }
}

// Sync checkpoint operations
pub mod sync_states {
    use super::*;

    pub async fn get(
        conn: &mut AsyncPgConnection,
        mapping_id: Uuid,
    ) -> anyhow::Result<Option<SyncState>> {
        use crate::schema::sync_states::dsl::*;

        let state = sync_states
            .filter(calendar_mapping_id.eq(mapping_id))
            .select(SyncState::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(state)
    }

    /// Replace the checkpoint for a mapping wholesale.
    pub async fn upsert(conn: &mut AsyncPgConnection, state: &SyncState) -> anyhow::Result<()> {
        use crate::schema::sync_states::dsl::*;

        diesel::insert_into(sync_states)
            .values(state)
            .on_conflict(calendar_mapping_id)
            .do_update()
            .set((
                sync_cursor.eq(state.sync_cursor.as_deref()),
                status.eq(&state.status),
                last_sync_at.eq(state.last_sync_at),
            ))
            .execute(conn)
            .await?;

        Ok(())
    }
}

// Event mapping operations
pub mod event_mappings {
    use super::*;

    pub async fn get(
        conn: &mut AsyncPgConnection,
        mapping_id: Uuid,
        provider_id: &str,
    ) -> anyhow::Result<Option<EventMapping>> {
        use crate::schema::event_mappings::dsl::*;

        let mapping = event_mappings
            .filter(calendar_mapping_id.eq(mapping_id))
            .filter(provider_event_id.eq(provider_id))
            .select(EventMapping::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(mapping)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_mapping: NewEventMapping,
    ) -> anyhow::Result<EventMapping> {
        use crate::schema::event_mappings::dsl::*;

        let mapping = diesel::insert_into(event_mappings)
            .values(&new_mapping)
            .returning(EventMapping::as_returning())
            .get_result(conn)
            .await?;

        Ok(mapping)
    }

    /// Insert a local event and its event mapping in one transaction.
    pub async fn create_with_event(
        conn: &mut AsyncPgConnection,
        new_event: NewLocalEvent,
        mapping_id: Uuid,
        provider_id: String,
        etag: Option<String>,
        synced_at: DateTime<Utc>,
    ) -> anyhow::Result<EventMapping> {
        conn.transaction::<_, anyhow::Error, _>(|conn| {
            async move {
                let event = super::events::create(conn, new_event).await?;
                create(
                    conn,
                    NewEventMapping {
                        calendar_mapping_id: mapping_id,
                        local_event_id: event.id,
                        provider_event_id: provider_id,
                        provider_etag: etag,
                        last_synced_at: synced_at,
                    },
                )
                .await
            }
            .scope_boxed()
        })
        .await
    }

    pub async fn update_version(
        conn: &mut AsyncPgConnection,
        event_mapping_id: Uuid,
        etag: Option<&str>,
        synced_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        use crate::schema::event_mappings::dsl::*;

        diesel::update(event_mappings.filter(id.eq(event_mapping_id)))
            .set((provider_etag.eq(etag), last_synced_at.eq(synced_at)))
            .execute(conn)
            .await?;

        Ok(())
    }
}
