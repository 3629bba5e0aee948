//! Provider event → local event reconciliation.
//!
//! Identity is decided solely by the event mapping on (calendar mapping,
//! provider event id). Provider data always overwrites local fields.

use std::sync::Arc;

use calsync_types::LocalEventStatus;
use chrono::Utc;
use uuid::Uuid;

use super::error::SyncResult;
use crate::models::{CalendarMapping, LocalEventFields, NewLocalEvent};
use crate::provider::ProviderEvent;
use crate::store::SyncStore;

pub const UNTITLED_EVENT: &str = "Untitled event";
const DEFAULT_TIMEZONE: &str = "UTC";

/// A provider event that passed validation, with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEvent {
    pub provider_event_id: String,
    pub etag: Option<String>,
    pub fields: LocalEventFields,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventDisposition {
    Upsert(ValidatedEvent),
    Cancelled {
        provider_event_id: String,
        etag: Option<String>,
    },
    Skip(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Inserted(Uuid),
    Updated(Uuid),
}

pub fn classify(event: &ProviderEvent) -> EventDisposition {
    let id = match event.id.as_deref() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return EventDisposition::Skip("missing id"),
    };

    if event.is_cancelled() {
        return EventDisposition::Cancelled {
            provider_event_id: id,
            etag: event.etag.clone(),
        };
    }

    let start = event.start.as_ref().and_then(|t| t.to_utc());
    let end = event.end.as_ref().and_then(|t| t.to_utc());
    let (start_time, end_time) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        _ => return EventDisposition::Skip("missing start or end"),
    };

    let timezone = event
        .start
        .as_ref()
        .and_then(|t| t.time_zone.clone())
        .or_else(|| event.end.as_ref().and_then(|t| t.time_zone.clone()))
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());

    let title = event
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNTITLED_EVENT)
        .to_string();

    EventDisposition::Upsert(ValidatedEvent {
        provider_event_id: id,
        etag: event.etag.clone(),
        fields: LocalEventFields {
            title,
            description: event.description.clone(),
            start_time,
            end_time,
            timezone,
            status: LocalEventStatus::Scheduled.as_str().to_string(),
        },
    })
}

pub struct Reconciler {
    store: Arc<dyn SyncStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }

    /// Insert or update the local copy of one provider event.
    pub async fn reconcile(
        &self,
        mapping: &CalendarMapping,
        event: &ValidatedEvent,
    ) -> SyncResult<ReconcileOutcome> {
        let now = Utc::now();

        let existing = self
            .store
            .get_event_mapping(mapping.id, &event.provider_event_id)
            .await?;

        if let Some(link) = existing {
            self.store
                .update_local_event(link.local_event_id, &event.fields)
                .await?;
            self.store
                .update_event_mapping(link.id, event.etag.as_deref(), now)
                .await?;
            return Ok(ReconcileOutcome::Updated(link.local_event_id));
        }

        let link = self
            .store
            .create_local_event_with_mapping(
                NewLocalEvent::from_fields(mapping.local_calendar_id, event.fields.clone()),
                mapping.id,
                &event.provider_event_id,
                event.etag.as_deref(),
                now,
            )
            .await?;

        Ok(ReconcileOutcome::Inserted(link.local_event_id))
    }

    /// Mark a previously imported event cancelled, keeping its event mapping.
    /// Returns `None` when the event was never imported.
    pub async fn reconcile_cancellation(
        &self,
        mapping: &CalendarMapping,
        provider_event_id: &str,
        etag: Option<&str>,
    ) -> SyncResult<Option<Uuid>> {
        let Some(link) = self
            .store
            .get_event_mapping(mapping.id, provider_event_id)
            .await?
        else {
            return Ok(None);
        };

        self.store
            .set_local_event_status(link.local_event_id, LocalEventStatus::Cancelled)
            .await?;
        self.store
            .update_event_mapping(link.id, etag, Utc::now())
            .await?;

        Ok(Some(link.local_event_id))
    }
}
