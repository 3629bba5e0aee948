//! Google Calendar API v3 client over plain HTTPS.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{
    CalendarProvider, EventPage, EventQuery, ProviderCalendar, ProviderError, ProviderEvent,
    ProviderResult, TokenGrant,
};

pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
pub const DEFAULT_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

const SCOPES: &[&str] = &[
    "openid",
    "email",
    "https://www.googleapis.com/auth/calendar",
];

#[derive(Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub api_base_url: String,
    pub userinfo_url: String,
    pub request_timeout: Duration,
}

impl GoogleConfig {
    /// Config pointing at the public Google endpoints.
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            userinfo_url: DEFAULT_USERINFO_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct GoogleProvider {
    http: reqwest::Client,
    config: GoogleConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ProviderEvent>,
    next_page_token: Option<String>,
    next_sync_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<ProviderCalendar>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { http, config })
    }

    async fn post_token_form(&self, form: &[(&str, &str)]) -> ProviderResult<reqwest::Response> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await?;
        Ok(response)
    }

    /// Read a successful JSON body, mapping error statuses to `ProviderError`.
    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> ProviderResult<T> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(ProviderError::Unauthorized);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse response: {}", e)))
    }
}

#[async_trait]
impl CalendarProvider for GoogleProvider {
    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            self.config.auth_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&SCOPES.join(" ")),
            urlencoding::encode(state)
        )
    }

    async fn exchange_authorization_code(&self, code: &str) -> ProviderResult<TokenGrant> {
        let response = self
            .post_token_form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .await?;

        Self::read_json(response).await
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> ProviderResult<TokenGrant> {
        let response = self
            .post_token_form(&[
                ("refresh_token", refresh_token),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::RefreshRejected {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            ProviderError::InvalidResponse(format!("failed to parse token response: {}", e))
        })
    }

    async fn account_identity(&self, access_token: &str) -> ProviderResult<String> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let info: UserInfo = Self::read_json(response).await?;
        info.email
            .filter(|email| !email.is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("userinfo without email".to_string()))
    }

    async fn list_calendars(&self, access_token: &str) -> ProviderResult<Vec<ProviderCalendar>> {
        let url = format!("{}/users/me/calendarList", self.config.api_base_url);
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(&url)
                .bearer_auth(access_token)
                .query(&[("maxResults", "250")]);

            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: CalendarListResponse = Self::read_json(request.send().await?).await?;
            calendars.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!("Listed {} provider calendars", calendars.len());
        Ok(calendars)
    }

    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        query: &EventQuery,
        page_token: Option<&str>,
        page_size: u32,
    ) -> ProviderResult<EventPage> {
        let url = format!(
            "{}/calendars/{}/events",
            self.config.api_base_url,
            urlencoding::encode(calendar_id)
        );

        let mut params: Vec<(&str, String)> = vec![
            ("singleEvents", "true".to_string()),
            ("maxResults", page_size.to_string()),
        ];

        match query {
            EventQuery::Incremental { sync_token } => {
                params.push(("syncToken", sync_token.clone()));
            }
            EventQuery::Window { time_min } => {
                // orderBy is rejected when combined with syncToken
                params.push(("timeMin", time_min.to_rfc3339()));
                params.push(("orderBy", "startTime".to_string()));
            }
        }

        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&params)
            .send()
            .await?;

        if response.status() == StatusCode::GONE {
            if let EventQuery::Incremental { .. } = query {
                return Err(ProviderError::SyncTokenInvalidated);
            }
        }

        let list: EventListResponse = Self::read_json(response).await?;

        Ok(EventPage {
            items: list.items,
            next_page_token: list.next_page_token,
            next_sync_token: list.next_sync_token,
        })
    }
}
