use std::sync::Arc;

use calsync_types::{DiscoveryReport, SyncDirection};

use super::error::SyncResult;
use super::token::TokenManager;
use crate::models::{ConnectedAccount, LocalCalendar, NewCalendarMapping, NewLocalCalendar};
use crate::provider::{CalendarProvider, ProviderCalendar, ProviderError};
use crate::store::SyncStore;

enum MappingOutcome {
    Created,
    AlreadyMapped,
}

/// Creates a calendar mapping for every writable provider calendar of an
/// account. Safe to run repeatedly.
pub struct CalendarDiscovery {
    store: Arc<dyn SyncStore>,
    provider: Arc<dyn CalendarProvider>,
    tokens: Arc<TokenManager>,
}

impl CalendarDiscovery {
    pub fn new(
        store: Arc<dyn SyncStore>,
        provider: Arc<dyn CalendarProvider>,
        tokens: Arc<TokenManager>,
    ) -> Self {
        Self {
            store,
            provider,
            tokens,
        }
    }

    pub async fn discover_calendars(
        &self,
        account: &ConnectedAccount,
    ) -> SyncResult<DiscoveryReport> {
        let token = self.tokens.ensure_valid_access_token(account).await?;
        let calendars = match self.provider.list_calendars(token.as_str()).await {
            Ok(calendars) => calendars,
            Err(ProviderError::Unauthorized) => {
                self.tokens.expire_access_token(account.id).await;
                return Err(ProviderError::Unauthorized.into());
            }
            Err(e) => return Err(e.into()),
        };

        let mut report = DiscoveryReport {
            discovered: calendars.len(),
            ..Default::default()
        };

        for calendar in calendars {
            let Some(provider_id) = calendar.id.clone().filter(|id| !id.is_empty()) else {
                continue;
            };
            if !calendar.is_writable() {
                tracing::debug!(
                    account_id = %account.id,
                    calendar = %provider_id,
                    "Skipping read-only calendar"
                );
                continue;
            }
            report.eligible += 1;

            match self.map_calendar(account, &provider_id, &calendar).await {
                Ok(MappingOutcome::Created) => report.created += 1,
                Ok(MappingOutcome::AlreadyMapped) => report.already_mapped += 1,
                Err(e) => {
                    tracing::error!(
                        account_id = %account.id,
                        calendar = %provider_id,
                        "Failed to map calendar: {:#}",
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            account_id = %account.id,
            discovered = report.discovered,
            eligible = report.eligible,
            created = report.created,
            already_mapped = report.already_mapped,
            failed = report.failed,
            "Calendar discovery finished"
        );

        Ok(report)
    }

    async fn map_calendar(
        &self,
        account: &ConnectedAccount,
        provider_id: &str,
        calendar: &ProviderCalendar,
    ) -> anyhow::Result<MappingOutcome> {
        if self
            .store
            .find_calendar_mapping(account.id, provider_id)
            .await?
            .is_some()
        {
            return Ok(MappingOutcome::AlreadyMapped);
        }

        let name = calendar
            .summary
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| provider_id.to_string());

        let local = self.local_calendar_named(account, &name, calendar).await?;

        let created = self
            .store
            .create_calendar_mapping(NewCalendarMapping {
                connected_account_id: account.id,
                local_calendar_id: local.id,
                provider_calendar_id: provider_id.to_string(),
                provider_calendar_name: name,
                sync_enabled: true,
                sync_direction: SyncDirection::Bidirectional.as_str().to_string(),
            })
            .await?;

        // Lost a race against a concurrent discovery run
        Ok(match created {
            Some(_) => MappingOutcome::Created,
            None => MappingOutcome::AlreadyMapped,
        })
    }

    /// Reuse the user's calendar with exactly this name, or create one.
    async fn local_calendar_named(
        &self,
        account: &ConnectedAccount,
        name: &str,
        calendar: &ProviderCalendar,
    ) -> anyhow::Result<LocalCalendar> {
        let existing = self
            .store
            .list_local_calendars(account.user_id)
            .await?
            .into_iter()
            .find(|c| c.name == name);

        if let Some(local) = existing {
            return Ok(local);
        }

        self.store
            .create_local_calendar(NewLocalCalendar {
                user_id: account.user_id,
                name: name.to_string(),
                color: calendar.background_color.clone(),
                description: calendar.description.clone(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fake::{FakeProvider, ProviderCall};
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn account() -> ConnectedAccount {
        let now = Utc::now();
        ConnectedAccount {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            provider: "google".to_string(),
            provider_account_id: "user@example.com".to_string(),
            access_token: Some("token".to_string()),
            refresh_token: Some("refresh".to_string()),
            token_expires_at: Some(now + Duration::hours(1)),
            scope: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn calendar(id: &str, summary: &str, role: &str) -> ProviderCalendar {
        ProviderCalendar {
            id: Some(id.to_string()),
            summary: Some(summary.to_string()),
            description: None,
            background_color: Some("#0b8043".to_string()),
            access_role: Some(role.to_string()),
        }
    }

    fn discovery(store: &Arc<MemoryStore>, provider: &Arc<FakeProvider>) -> CalendarDiscovery {
        let tokens = Arc::new(TokenManager::new(store.clone(), provider.clone()));
        CalendarDiscovery::new(store.clone(), provider.clone(), tokens)
    }

    #[tokio::test]
    async fn test_discovery_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new());
        provider.set_calendars(vec![
            calendar("primary", "Work", "owner"),
            calendar("family", "Family", "writer"),
            calendar("holidays", "Holidays", "reader"),
        ]);
        let acct = account();
        let discovery = discovery(&store, &provider);

        let first = discovery.discover_calendars(&acct).await.unwrap();
        let second = discovery.discover_calendars(&acct).await.unwrap();

        assert_eq!(first.discovered, 3);
        assert_eq!(first.eligible, 2);
        assert_eq!(first.created, 2);
        assert_eq!(second.created, 0);
        assert_eq!(second.already_mapped, 2);
        assert_eq!(store.list_calendar_mappings(acct.id).await.unwrap().len(), 2);
        assert_eq!(store.list_local_calendars(acct.user_id).await.unwrap().len(), 2);
        assert_eq!(
            provider.calls(),
            vec![ProviderCall::ListCalendars, ProviderCall::ListCalendars]
        );
    }

    #[tokio::test]
    async fn test_existing_local_calendar_is_reused_by_name() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new());
        let acct = account();
        let existing = store
            .create_local_calendar(NewLocalCalendar {
                user_id: acct.user_id,
                name: "Work".to_string(),
                color: None,
                description: None,
            })
            .await
            .unwrap();
        provider.set_calendars(vec![calendar("primary", "Work", "owner")]);

        discovery(&store, &provider)
            .discover_calendars(&acct)
            .await
            .unwrap();

        let mappings = store.list_calendar_mappings(acct.id).await.unwrap();
        assert_eq!(mappings[0].local_calendar_id, existing.id);
        assert_eq!(store.list_local_calendars(acct.user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_one_failing_calendar_does_not_abort_others() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new());
        provider.set_calendars(vec![
            calendar("a", "Alpha", "owner"),
            calendar("b", "Broken", "owner"),
            calendar("c", "Gamma", "writer"),
        ]);
        store.fail_calendar_named("Broken").await;
        let acct = account();

        let report = discovery(&store, &provider)
            .discover_calendars(&acct)
            .await
            .unwrap();

        assert_eq!(report.eligible, 3);
        assert_eq!(report.created, 2);
        assert_eq!(report.failed, 1);
        let names: Vec<String> = store
            .list_calendar_mappings(acct.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.provider_calendar_name)
            .collect();
        assert_eq!(names, vec!["Alpha".to_string(), "Gamma".to_string()]);
    }

    #[tokio::test]
    async fn test_calendars_without_id_are_ignored() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new());
        let mut nameless = calendar("", "Ghost", "owner");
        nameless.id = Some(String::new());
        provider.set_calendars(vec![nameless]);
        let acct = account();

        let report = discovery(&store, &provider)
            .discover_calendars(&acct)
            .await
            .unwrap();

        assert_eq!(report.discovered, 1);
        assert_eq!(report.eligible, 0);
        assert!(store.list_calendar_mappings(acct.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_token_during_discovery_expires_stored_token() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new());
        let acct = account();
        store.insert_account(acct.clone()).await;
        provider.reject_next_calendar_listing();

        let err = discovery(&store, &provider)
            .discover_calendars(&acct)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        let stored = store.get_connected_account(acct.id).await.unwrap().unwrap();
        assert!(stored.token_expires_at.unwrap() <= Utc::now());
        assert!(store.list_calendar_mappings(acct.id).await.unwrap().is_empty());
    }
}
