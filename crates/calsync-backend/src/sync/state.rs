use calsync_types::SyncStatus;

use crate::models::SyncState;

pub const STATUS_IDLE: &str = "idle";
pub const STATUS_INVALIDATED: &str = "invalidated";

/// Where the next pass for a mapping starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    /// Never completed a pass that returned a cursor
    NoCursor,
    Valid(String),
    /// The provider rejected the last cursor; resync from the window
    Invalidated,
}

impl CursorState {
    pub fn from_row(row: Option<&SyncState>) -> Self {
        match row {
            None => CursorState::NoCursor,
            Some(state) if state.status == STATUS_INVALIDATED => CursorState::Invalidated,
            Some(state) => match state.sync_cursor.as_deref() {
                Some(cursor) if !cursor.is_empty() => CursorState::Valid(cursor.to_string()),
                _ => CursorState::NoCursor,
            },
        }
    }

    pub fn cursor(&self) -> Option<&str> {
        match self {
            CursorState::Valid(cursor) => Some(cursor),
            _ => None,
        }
    }
}

/// Externally reported status, combining the stored checkpoint with
/// in-process facts that are never persisted.
pub fn derive_status(
    row: Option<&SyncState>,
    in_flight: bool,
    last_error: Option<&str>,
) -> SyncStatus {
    if in_flight {
        return SyncStatus::Syncing;
    }
    if last_error.is_some() {
        return SyncStatus::Error;
    }
    match CursorState::from_row(row) {
        CursorState::Invalidated => SyncStatus::Invalidated,
        CursorState::Valid(_) => SyncStatus::Idle,
        CursorState::NoCursor if row.is_some() => SyncStatus::Idle,
        CursorState::NoCursor => SyncStatus::NeverSynced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn row(cursor: Option<&str>, status: &str) -> SyncState {
        SyncState {
            calendar_mapping_id: Uuid::new_v4(),
            sync_cursor: cursor.map(str::to_string),
            status: status.to_string(),
            last_sync_at: Utc::now(),
        }
    }

    #[test]
    fn test_cursor_state_from_rows() {
        assert_eq!(CursorState::from_row(None), CursorState::NoCursor);
        assert_eq!(
            CursorState::from_row(Some(&row(Some("T1"), STATUS_IDLE))),
            CursorState::Valid("T1".to_string())
        );
        assert_eq!(
            CursorState::from_row(Some(&row(None, STATUS_INVALIDATED))),
            CursorState::Invalidated
        );
        assert_eq!(
            CursorState::from_row(Some(&row(Some(""), STATUS_IDLE))),
            CursorState::NoCursor
        );
    }

    #[test]
    fn test_derived_status_prefers_in_flight_then_error() {
        let idle = row(Some("T1"), STATUS_IDLE);
        assert_eq!(derive_status(Some(&idle), true, Some("boom")), SyncStatus::Syncing);
        assert_eq!(derive_status(Some(&idle), false, Some("boom")), SyncStatus::Error);
        assert_eq!(derive_status(Some(&idle), false, None), SyncStatus::Idle);
        assert_eq!(derive_status(None, false, None), SyncStatus::NeverSynced);
        let invalidated = row(None, STATUS_INVALIDATED);
        assert_eq!(
            derive_status(Some(&invalidated), false, None),
            SyncStatus::Invalidated
        );
    }
}
