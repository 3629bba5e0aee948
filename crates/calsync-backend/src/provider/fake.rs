//! Scripted `CalendarProvider` for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    CalendarProvider, EventPage, EventQuery, ProviderCalendar, ProviderError, ProviderEvent,
    ProviderResult, TokenGrant,
};

/// Calls observed by the fake, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    Refresh(String),
    ExchangeCode(String),
    Identity,
    ListCalendars,
    ListEvents {
        calendar_id: String,
        query: EventQuery,
        page_token: Option<String>,
    },
}

#[derive(Default)]
pub struct FakeProvider {
    calls: Mutex<Vec<ProviderCall>>,
    event_responses: Mutex<VecDeque<ProviderResult<EventPage>>>,
    refresh_responses: Mutex<VecDeque<ProviderResult<TokenGrant>>>,
    calendars: Mutex<Vec<ProviderCalendar>>,
    identity: Mutex<Option<String>>,
    reject_calendar_listing: Mutex<bool>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next `list_events` response.
    pub fn push_page(&self, page: ProviderResult<EventPage>) {
        self.event_responses.lock().unwrap().push_back(page);
    }

    pub fn push_refresh(&self, grant: ProviderResult<TokenGrant>) {
        self.refresh_responses.lock().unwrap().push_back(grant);
    }

    /// Answer the next `list_calendars` call with `Unauthorized`.
    pub fn reject_next_calendar_listing(&self) {
        *self.reject_calendar_listing.lock().unwrap() = true;
    }

    pub fn set_calendars(&self, calendars: Vec<ProviderCalendar>) {
        *self.calendars.lock().unwrap() = calendars;
    }

    pub fn set_identity(&self, email: &str) {
        *self.identity.lock().unwrap() = Some(email.to_string());
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn event_queries(&self) -> Vec<EventQuery> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::ListEvents { query, .. } => Some(query),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ProviderCall) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn timed_event(id: &str, title: &str, start: &str, end: &str) -> ProviderEvent {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "summary": title,
        "status": "confirmed",
        "etag": format!("\"{}-{}\"", id, title),
        "start": {"dateTime": start, "timeZone": "Europe/Paris"},
        "end": {"dateTime": end, "timeZone": "Europe/Paris"},
    }))
    .unwrap()
}

pub fn cancelled_event(id: &str) -> ProviderEvent {
    ProviderEvent {
        id: Some(id.to_string()),
        status: Some("cancelled".to_string()),
        ..Default::default()
    }
}

pub fn final_page(items: Vec<ProviderEvent>, sync_token: &str) -> EventPage {
    EventPage {
        items,
        next_page_token: None,
        next_sync_token: Some(sync_token.to_string()),
    }
}

#[async_trait]
impl CalendarProvider for FakeProvider {
    fn authorization_url(&self, state: &str) -> String {
        format!("https://consent.test/auth?state={}", state)
    }

    async fn exchange_authorization_code(&self, code: &str) -> ProviderResult<TokenGrant> {
        self.record(ProviderCall::ExchangeCode(code.to_string()));
        Ok(TokenGrant {
            access_token: format!("access-for-{}", code),
            expires_in: 3600,
            refresh_token: Some(format!("refresh-for-{}", code)),
            scope: Some("https://www.googleapis.com/auth/calendar".to_string()),
        })
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> ProviderResult<TokenGrant> {
        self.record(ProviderCall::Refresh(refresh_token.to_string()));
        self.refresh_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ProviderError::InvalidResponse(
                    "no scripted refresh response".to_string(),
                ))
            })
    }

    async fn account_identity(&self, _access_token: &str) -> ProviderResult<String> {
        self.record(ProviderCall::Identity);
        self.identity
            .lock()
            .unwrap()
            .clone()
            .ok_or(ProviderError::Unauthorized)
    }

    async fn list_calendars(&self, _access_token: &str) -> ProviderResult<Vec<ProviderCalendar>> {
        self.record(ProviderCall::ListCalendars);
        if std::mem::take(&mut *self.reject_calendar_listing.lock().unwrap()) {
            return Err(ProviderError::Unauthorized);
        }
        Ok(self.calendars.lock().unwrap().clone())
    }

    async fn list_events(
        &self,
        _access_token: &str,
        calendar_id: &str,
        query: &EventQuery,
        page_token: Option<&str>,
        _page_size: u32,
    ) -> ProviderResult<EventPage> {
        self.record(ProviderCall::ListEvents {
            calendar_id: calendar_id.to_string(),
            query: query.clone(),
            page_token: page_token.map(str::to_string),
        });
        self.event_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(EventPage::default()))
    }
}
