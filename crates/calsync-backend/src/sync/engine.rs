//! Incremental sync of one calendar mapping.

use std::sync::Arc;

use calsync_types::SyncReport;
use chrono::{Duration, Utc};
use uuid::Uuid;

use super::error::{SyncError, SyncResult};
use super::locks::SyncLocks;
use super::reconcile::{classify, EventDisposition, ReconcileOutcome, Reconciler};
use super::state::{CursorState, STATUS_IDLE, STATUS_INVALIDATED};
use super::token::{AccessToken, TokenManager};
use crate::models::{CalendarMapping, SyncState};
use crate::provider::{CalendarProvider, EventQuery, ProviderError, ProviderEvent};
use crate::store::SyncStore;

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// How far back a windowed (cursorless) pass starts
    pub initial_window_days: i64,
    pub page_size: u32,
    /// Upper bound on pages fetched in one pass
    pub max_pages: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            initial_window_days: 30,
            page_size: 250,
            max_pages: 40,
        }
    }
}

/// Everything the provider returned for one pass.
struct FetchedChanges {
    items: Vec<ProviderEvent>,
    next_sync_token: Option<String>,
}

pub struct SyncEngine {
    store: Arc<dyn SyncStore>,
    provider: Arc<dyn CalendarProvider>,
    tokens: Arc<TokenManager>,
    reconciler: Reconciler,
    locks: SyncLocks,
    settings: SyncSettings,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn SyncStore>,
        provider: Arc<dyn CalendarProvider>,
        tokens: Arc<TokenManager>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(store.clone()),
            store,
            provider,
            tokens,
            locks: SyncLocks::new(),
            settings,
        }
    }

    /// Whether a pass for this mapping is running right now.
    pub async fn is_syncing(&self, mapping_id: Uuid) -> bool {
        self.locks.is_locked(mapping_id).await
    }

    /// Run one sync pass for a calendar mapping.
    ///
    /// Passes for the same mapping are serialized. Nothing is written until
    /// the provider listing has been fetched completely, so a pass that fails
    /// mid-fetch leaves local state as it was.
    pub async fn sync_mapping(&self, mapping_id: Uuid) -> SyncResult<SyncReport> {
        let _guard = self.locks.acquire(mapping_id).await;

        let mapping = self
            .store
            .get_calendar_mapping(mapping_id)
            .await?
            .ok_or_else(|| SyncError::not_found("Calendar mapping"))?;

        let result = self.run_pass(&mapping).await;

        match &result {
            Ok(report) => {
                tracing::info!(
                    mapping_id = %mapping.id,
                    imported = report.imported,
                    updated = report.updated,
                    cancelled = report.cancelled,
                    skipped = report.skipped,
                    failed = report.failed,
                    total_seen = report.total_seen,
                    cursor_reset = report.cursor_reset,
                    "Sync pass finished"
                );
            }
            Err(SyncError::NotFound(_)) => {}
            Err(e) => {
                tracing::warn!(
                    mapping_id = %mapping.id,
                    retryable = e.is_retryable(),
                    "Sync pass failed: {}",
                    e
                );
                if let Err(record_err) = self
                    .store
                    .record_mapping_error(mapping.id, &e.to_string())
                    .await
                {
                    tracing::error!(
                        mapping_id = %mapping.id,
                        "Failed to record sync error: {:#}",
                        record_err
                    );
                }
            }
        }

        result
    }

    async fn run_pass(&self, mapping: &CalendarMapping) -> SyncResult<SyncReport> {
        let account = self
            .store
            .get_connected_account(mapping.connected_account_id)
            .await?
            .filter(|a| a.is_active)
            .ok_or_else(|| SyncError::not_found("Connected account"))?;

        let token = self.tokens.ensure_valid_access_token(&account).await?;

        let stored = self.store.get_sync_state(mapping.id).await?;
        let cursor = CursorState::from_row(stored.as_ref());
        let query = match &cursor {
            CursorState::Valid(sync_token) => EventQuery::Incremental {
                sync_token: sync_token.clone(),
            },
            CursorState::NoCursor | CursorState::Invalidated => EventQuery::Window {
                time_min: Utc::now() - Duration::days(self.settings.initial_window_days),
            },
        };

        tracing::debug!(mapping_id = %mapping.id, ?cursor, "Starting sync pass");

        let changes = match self.fetch_changes(&token, mapping, &query).await {
            Ok(changes) => changes,
            Err(ProviderError::SyncTokenInvalidated) => {
                tracing::warn!(
                    mapping_id = %mapping.id,
                    "Sync cursor rejected by provider, next pass resyncs the window"
                );
                self.store
                    .upsert_sync_state(SyncState {
                        calendar_mapping_id: mapping.id,
                        sync_cursor: None,
                        status: STATUS_INVALIDATED.to_string(),
                        last_sync_at: Utc::now(),
                    })
                    .await?;
                return Ok(SyncReport {
                    cursor_reset: true,
                    ..Default::default()
                });
            }
            Err(ProviderError::Unauthorized) => {
                self.tokens.expire_access_token(account.id).await;
                return Err(ProviderError::Unauthorized.into());
            }
            Err(e) => return Err(e.into()),
        };

        let mut report = SyncReport::default();

        for event in &changes.items {
            report.total_seen += 1;

            match classify(event) {
                EventDisposition::Skip(reason) => {
                    tracing::debug!(mapping_id = %mapping.id, reason, "Skipping provider event");
                    report.skipped += 1;
                }
                EventDisposition::Cancelled {
                    provider_event_id,
                    etag,
                } => match self
                    .reconciler
                    .reconcile_cancellation(mapping, &provider_event_id, etag.as_deref())
                    .await
                {
                    Ok(Some(_)) => report.cancelled += 1,
                    Ok(None) => report.skipped += 1,
                    Err(e) => {
                        tracing::error!(
                            mapping_id = %mapping.id,
                            event = %provider_event_id,
                            "Failed to cancel event: {}",
                            e
                        );
                        report.failed += 1;
                    }
                },
                EventDisposition::Upsert(validated) => {
                    match self.reconciler.reconcile(mapping, &validated).await {
                        Ok(ReconcileOutcome::Inserted(_)) => report.imported += 1,
                        Ok(ReconcileOutcome::Updated(_)) => report.updated += 1,
                        Err(e) => {
                            tracing::error!(
                                mapping_id = %mapping.id,
                                event = %validated.provider_event_id,
                                "Failed to reconcile event: {}",
                                e
                            );
                            report.failed += 1;
                        }
                    }
                }
            }
        }

        let now = Utc::now();

        match changes.next_sync_token {
            Some(next_cursor) => {
                self.store
                    .upsert_sync_state(SyncState {
                        calendar_mapping_id: mapping.id,
                        sync_cursor: Some(next_cursor),
                        status: STATUS_IDLE.to_string(),
                        last_sync_at: now,
                    })
                    .await?;
            }
            None => {
                tracing::warn!(
                    mapping_id = %mapping.id,
                    "Provider returned no sync cursor, keeping previous checkpoint"
                );
            }
        }

        self.store.mark_mapping_synced(mapping.id, now).await?;

        Ok(report)
    }

    /// Fetch every page of the listing before anything is reconciled.
    async fn fetch_changes(
        &self,
        token: &AccessToken,
        mapping: &CalendarMapping,
        query: &EventQuery,
    ) -> Result<FetchedChanges, ProviderError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        for page_number in 1..=self.settings.max_pages {
            let page = self
                .provider
                .list_events(
                    token.as_str(),
                    &mapping.provider_calendar_id,
                    query,
                    page_token.as_deref(),
                    self.settings.page_size,
                )
                .await?;

            items.extend(page.items);

            match page.next_page_token {
                Some(next) => {
                    if page_number == self.settings.max_pages {
                        tracing::warn!(
                            mapping_id = %mapping.id,
                            max_pages = self.settings.max_pages,
                            "Page limit reached before the listing completed"
                        );
                    }
                    page_token = Some(next);
                }
                None => {
                    return Ok(FetchedChanges {
                        items,
                        next_sync_token: page.next_sync_token,
                    });
                }
            }
        }

        Ok(FetchedChanges {
            items,
            next_sync_token: None,
        })
    }
}
