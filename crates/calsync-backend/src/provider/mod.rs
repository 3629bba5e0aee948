//! Calendar provider abstraction.
//!
//! Everything the sync engine needs from a remote calendar service goes
//! through [`CalendarProvider`]. Wire records are all-optional; the engine
//! validates and defaults them before anything reaches local storage.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Deserialize;
use thiserror::Error;

#[cfg(test)]
pub mod fake;
pub mod google;

pub use google::{GoogleConfig, GoogleProvider};

/// Result of exchanging a refresh token or an authorization code.
#[derive(Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime of the access token in seconds
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    /// Present only when the provider issues or rotates a refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("expires_in", &self.expires_in)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("scope", &self.scope)
            .finish()
    }
}

/// Calendar list entry as returned by the provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCalendar {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub access_role: Option<String>,
}

impl ProviderCalendar {
    /// Only calendars the account can write to are mirrored.
    pub fn is_writable(&self) -> bool {
        matches!(self.access_role.as_deref(), Some("owner") | Some("writer"))
    }
}

/// Start or end of a provider event: either a timestamp or an all-day date.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default)]
    pub date_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

impl EventTime {
    /// Resolve to a UTC instant. All-day dates map to midnight UTC.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        if let Some(dt) = self.date_time {
            return Some(dt.with_timezone(&Utc));
        }
        self.date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start: Option<EventTime>,
    #[serde(default)]
    pub end: Option<EventTime>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub etag: Option<String>,
}

impl ProviderEvent {
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }
}

/// Which slice of a calendar's events to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventQuery {
    /// Changes since the cursor returned by a previous pass
    Incremental { sync_token: String },
    /// Every event starting at or after `time_min`
    Window { time_min: DateTime<Utc> },
}

/// One page of an event listing.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub items: Vec<ProviderEvent>,
    pub next_page_token: Option<String>,
    /// Only present on the last page of a complete listing
    pub next_sync_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The sync token is no longer accepted; a full window resync is needed
    #[error("sync token is no longer valid")]
    SyncTokenInvalidated,

    /// The refresh token was rejected by the token endpoint
    #[error("refresh token rejected ({status}): {message}")]
    RefreshRejected { status: u16, message: String },

    #[error("access token rejected by provider")]
    Unauthorized,

    #[error("provider returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request to provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Transport failures, rate limiting and 5xx are worth retrying later.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) | ProviderError::Unauthorized => true,
            ProviderError::Status { status, .. } => {
                matches!(*status, 401 | 403 | 429) || *status >= 500
            }
            ProviderError::RefreshRejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// URL the user is sent to for consent; `state` is echoed to the callback.
    fn authorization_url(&self, state: &str) -> String;

    async fn exchange_authorization_code(&self, code: &str) -> ProviderResult<TokenGrant>;

    async fn exchange_refresh_token(&self, refresh_token: &str) -> ProviderResult<TokenGrant>;

    /// Stable account identifier (the account email) for an access token.
    async fn account_identity(&self, access_token: &str) -> ProviderResult<String>;

    /// All calendars visible to the token, following pagination.
    async fn list_calendars(&self, access_token: &str) -> ProviderResult<Vec<ProviderCalendar>>;

    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        query: &EventQuery,
        page_token: Option<&str>,
        page_size: u32,
    ) -> ProviderResult<EventPage>;
}
