//! Process configuration, read once from the environment at startup.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::auth::AuthConfig;
use crate::pollers::CalendarPollerConfig;
use crate::provider::GoogleConfig;
use crate::sync::SyncSettings;

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub auth: AuthConfig,
    pub google: GoogleConfig,
    pub sync: SyncSettings,
    pub poller: CalendarPollerConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Required: `DATABASE_URL`, `JWT_SECRET`, `GOOGLE_CLIENT_ID`,
    /// `GOOGLE_CLIENT_SECRET`, `OAUTH_REDIRECT_URI`.
    pub fn from_env() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL environment variable must be set")?;

        let auth = AuthConfig::from_env().map_err(|e| anyhow!(e))?;

        let mut google = GoogleConfig::new(
            required("GOOGLE_CLIENT_ID")?,
            required("GOOGLE_CLIENT_SECRET")?,
            required("OAUTH_REDIRECT_URI")?,
        );
        if let Ok(url) = std::env::var("GOOGLE_AUTH_URL") {
            google.auth_url = url;
        }
        if let Ok(url) = std::env::var("GOOGLE_TOKEN_URL") {
            google.token_url = url;
        }
        if let Ok(url) = std::env::var("GOOGLE_API_BASE_URL") {
            google.api_base_url = url;
        }
        if let Ok(url) = std::env::var("GOOGLE_USERINFO_URL") {
            google.userinfo_url = url;
        }
        google.request_timeout = Duration::from_secs(parse_or("GOOGLE_REQUEST_TIMEOUT_SECS", 30)?);

        let defaults = SyncSettings::default();
        let sync = SyncSettings {
            initial_window_days: parse_or("SYNC_INITIAL_WINDOW_DAYS", defaults.initial_window_days)?,
            page_size: parse_or("SYNC_PAGE_SIZE", defaults.page_size)?,
            max_pages: parse_or("SYNC_MAX_PAGES", defaults.max_pages)?,
        };
        if sync.page_size == 0 || sync.page_size > 2500 {
            return Err(anyhow!("SYNC_PAGE_SIZE must be between 1 and 2500"));
        }
        if sync.max_pages == 0 {
            return Err(anyhow!("SYNC_MAX_PAGES must be at least 1"));
        }

        Ok(Self {
            database_url,
            port: parse_or("PORT", 3000)?,
            auth,
            google,
            sync,
            poller: CalendarPollerConfig::from_env(),
        })
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{} environment variable must be set", key))
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid value for {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}
