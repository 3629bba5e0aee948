//! Background polling tasks.
//!
//! The calendar poller runs as a tokio background task inside the backend
//! process rather than as a separate service.

pub mod calendar;

pub use calendar::{start_calendar_polling_task, CalendarPollerConfig};
