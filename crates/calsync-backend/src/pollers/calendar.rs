//! Calendar polling background task.
//!
//! Runs as a tokio task inside the backend process and periodically syncs
//! every sync-enabled mapping of every active connected account.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::stream::{self, StreamExt};

use crate::store::SyncStore;
use crate::sync::SyncEngine;

/// Configuration for the calendar polling task
#[derive(Debug, Clone)]
pub struct CalendarPollerConfig {
    pub enabled: bool,
    /// How often to poll calendars (default: 15 minutes)
    pub poll_interval: Duration,
    /// How many mappings are synced at the same time
    pub concurrency: usize,
}

impl Default for CalendarPollerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: Duration::from_secs(900), // 15 minutes
            concurrency: 4,
        }
    }
}

impl CalendarPollerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let enabled = std::env::var("CALENDAR_POLL_ENABLED")
            .ok()
            .map(|s| !matches!(s.trim().to_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(true);

        let poll_interval_secs = std::env::var("CALENDAR_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(900);

        let concurrency = std::env::var("CALENDAR_POLL_CONCURRENCY")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(4);

        Self {
            enabled,
            poll_interval: Duration::from_secs(poll_interval_secs),
            concurrency,
        }
    }
}

/// Outcome of one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub mappings: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Start the calendar polling background task.
pub async fn start_calendar_polling_task(
    store: Arc<dyn SyncStore>,
    engine: Arc<SyncEngine>,
    config: CalendarPollerConfig,
) {
    tracing::info!(
        "Starting calendar polling task (interval: {:?}, concurrency: {})",
        config.poll_interval,
        config.concurrency
    );

    loop {
        match run_poll_cycle(store.as_ref(), &engine, config.concurrency).await {
            Ok(summary) => tracing::info!(
                mappings = summary.mappings,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Calendar poll cycle complete"
            ),
            Err(e) => tracing::error!("Calendar poll cycle failed: {:#}", e),
        }

        tokio::time::sleep(config.poll_interval).await;
    }
}

/// Sync all enabled mappings once, at most `concurrency` at a time.
pub async fn run_poll_cycle(
    store: &dyn SyncStore,
    engine: &SyncEngine,
    concurrency: usize,
) -> Result<PollSummary> {
    let mappings = store.list_sync_enabled_mappings().await?;

    let mut summary = PollSummary {
        mappings: mappings.len(),
        ..Default::default()
    };

    let results: Vec<bool> = stream::iter(mappings)
        .map(|mapping| async move {
            match engine.sync_mapping(mapping.id).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(
                        mapping_id = %mapping.id,
                        retryable = e.is_retryable(),
                        "Scheduled sync failed: {}",
                        e
                    );
                    false
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    summary.succeeded = results.iter().filter(|ok| **ok).count();
    summary.failed = summary.mappings - summary.succeeded;

    Ok(summary)
}
