use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const GOOGLE_PROVIDER: &str = "google";

/// Direction in which a calendar mapping is kept in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    Bidirectional,
    OneWay,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::Bidirectional => "bidirectional",
            SyncDirection::OneWay => "one_way",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "bidirectional" => Some(SyncDirection::Bidirectional),
            "one_way" => Some(SyncDirection::OneWay),
            _ => None,
        }
    }
}

/// Status of a local event mirrored from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalEventStatus {
    Scheduled,
    Cancelled,
}

impl LocalEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocalEventStatus::Scheduled => "scheduled",
            LocalEventStatus::Cancelled => "cancelled",
        }
    }
}

/// Externally visible status of a mapping's sync checkpoint.
///
/// `Syncing` and `Error` are derived at read time (in-flight pass, last
/// failure recorded on the mapping); only `Idle` and `Invalidated` are
/// ever persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    NeverSynced,
    Idle,
    Syncing,
    Invalidated,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::NeverSynced => "never_synced",
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Invalidated => "invalidated",
            SyncStatus::Error => "error",
        }
    }
}

// ============================================================================
// Connected accounts
// ============================================================================

/// Connected account as returned by the API. Never carries token material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedAccountResponse {
    pub id: Uuid,
    pub provider: String,
    pub provider_account_id: String,
    pub scope: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthStartResponse {
    pub auth_url: String,
}

// ============================================================================
// Calendar mappings and sync
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarMappingResponse {
    pub id: Uuid,
    pub connected_account_id: Uuid,
    pub local_calendar_id: Uuid,
    pub provider_calendar_id: String,
    pub provider_calendar_name: String,
    pub sync_enabled: bool,
    pub sync_direction: SyncDirection,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_sync_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStateResponse {
    pub calendar_mapping_id: Uuid,
    pub status: SyncStatus,
    pub has_cursor: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_error: Option<String>,
}

/// Counters produced by one sync pass over a calendar mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Events seen for the first time (no prior event mapping)
    pub imported: usize,
    /// Events that already had an event mapping
    pub updated: usize,
    /// Previously imported events the provider now reports as cancelled
    pub cancelled: usize,
    /// Events dropped before reconciliation (missing id or times, or a
    /// cancellation for an event never imported)
    pub skipped: usize,
    /// Events whose reconciliation failed
    pub failed: usize,
    /// Every event returned by the provider, cancellations included
    pub total_seen: usize,
    /// The stored cursor was rejected; the next pass starts from the window
    pub cursor_reset: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    /// Calendars returned by the provider
    pub discovered: usize,
    /// Writable calendars with a usable id
    pub eligible: usize,
    pub created: usize,
    pub already_mapped: usize,
    pub failed: usize,
}

// ============================================================================
// Errors
// ============================================================================

/// API error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable reason, e.g. `not_found` or `provider_unavailable`
    pub reason: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_direction_round_trips_through_column_value() {
        for direction in [SyncDirection::Bidirectional, SyncDirection::OneWay] {
            assert_eq!(SyncDirection::from_str(direction.as_str()), Some(direction));
        }
        assert_eq!(SyncDirection::from_str("sideways"), None);
    }

    #[test]
    fn test_sync_report_serializes_snake_case_counters() {
        let report = SyncReport {
            imported: 2,
            total_seen: 3,
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["imported"], 2);
        assert_eq!(json["total_seen"], 3);
        assert_eq!(json["cursor_reset"], false);
    }

    #[test]
    fn test_error_response_omits_empty_details() {
        let body = ErrorResponse {
            error: "Calendar mapping not found".to_string(),
            reason: "not_found".to_string(),
            retryable: false,
            details: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("details"));
    }
}
