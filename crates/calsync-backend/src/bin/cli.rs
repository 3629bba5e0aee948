use anyhow::{bail, Context};
use calsync_types::{
    CalendarMappingResponse, ConnectedAccountResponse, DiscoveryReport, ErrorResponse,
    OAuthStartResponse, SyncReport, SyncStateResponse,
};
use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "calsync")]
#[command(about = "CLI for connected calendars and their sync state via the backend API")]
#[command(
    long_about = "A command-line interface for the calendar sync server.\n\n\
    Lists connected provider accounts, discovers their calendars, and triggers\n\
    or inspects synchronization of individual calendar mappings."
)]
struct Cli {
    /// Backend server URL to connect to.
    #[arg(
        short,
        long,
        default_value = "http://localhost:3000",
        env = "CALSYNC_API_URL"
    )]
    base_url: String,

    /// Session token (JWT) sent as a bearer credential.
    #[arg(long, env = "CALSYNC_TOKEN", hide_env_values = true)]
    token: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage connected provider accounts
    Accounts {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Inspect and sync calendar mappings
    Mappings {
        #[command(subcommand)]
        action: MappingAction,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// List active connected accounts
    List,

    /// Print the consent URL for connecting a new Google account
    ///
    /// Open the URL in a browser; the server finishes the connection when
    /// Google redirects back to it.
    Connect,

    /// Create mappings for the account's writable calendars
    Discover {
        /// Connected account UUID (see 'accounts list').
        id: Uuid,
    },

    /// Deactivate an account. Imported events are kept.
    Disconnect { id: Uuid },
}

#[derive(Subcommand)]
enum MappingAction {
    /// List calendar mappings of a connected account
    List {
        /// Connected account UUID.
        account: Uuid,
    },

    /// Run a sync pass now and print its counters
    Sync {
        /// Calendar mapping UUID (see 'mappings list').
        id: Uuid,
    },

    /// Show cursor and status of a mapping
    State { id: Uuid },

    /// Enable or disable scheduled sync for a mapping
    Toggle { id: Uuid },
}

struct Api {
    client: Client,
    base_url: String,
    token: String,
}

impl Api {
    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url.trim_end_matches('/'), path))
            .bearer_auth(&self.token)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let response = self.request(reqwest::Method::GET, path).send().await?;
        decode(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let response = self.request(reqwest::Method::POST, path).send().await?;
        decode(response).await
    }

    async fn delete(&self, path: &str) -> anyhow::Result<()> {
        let response = self.request(reqwest::Method::DELETE, path).send().await?;
        check(response).await.map(|_| ())
    }
}

/// Turn a non-2xx answer into an error carrying the server's reason.
async fn check(response: Response) -> anyhow::Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(err) if err.retryable => bail!("{} ({}, retryable): {}", status, err.reason, err.error),
        Ok(err) => bail!("{} ({}): {}", status, err.reason, err.error),
        Err(_) => bail!("{}: {}", status, body),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> anyhow::Result<T> {
    check(response)
        .await?
        .json()
        .await
        .context("Failed to parse server response")
}

fn short(id: &Uuid) -> String {
    id.to_string()[..8].to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let api = Api {
        client: Client::new(),
        base_url: cli.base_url,
        token: cli.token,
    };

    match cli.command {
        Commands::Accounts { action } => handle_accounts(&api, action).await?,
        Commands::Mappings { action } => handle_mappings(&api, action).await?,
    }

    Ok(())
}

async fn handle_accounts(api: &Api, action: AccountAction) -> anyhow::Result<()> {
    match action {
        AccountAction::List => {
            let accounts: Vec<ConnectedAccountResponse> =
                api.get("/api/connected-accounts").await?;
            if accounts.is_empty() {
                println!("No connected accounts.");
            } else {
                for account in accounts {
                    println!(
                        "[{}] {} ({})",
                        short(&account.id),
                        account.provider_account_id,
                        account.provider
                    );
                    if let Some(expires) = account.token_expires_at {
                        println!("    Access token expires: {}", expires.to_rfc3339());
                    }
                }
            }
        }
        AccountAction::Connect => {
            let start: OAuthStartResponse =
                api.post("/api/connected-accounts/oauth/start").await?;
            println!("Open this URL to grant calendar access:");
            println!("{}", start.auth_url);
        }
        AccountAction::Discover { id } => {
            let report: DiscoveryReport = api
                .post(&format!("/api/connected-accounts/{}/discover", id))
                .await?;
            println!(
                "Discovered {} calendars ({} writable): {} new, {} already mapped, {} failed",
                report.discovered,
                report.eligible,
                report.created,
                report.already_mapped,
                report.failed
            );
        }
        AccountAction::Disconnect { id } => {
            api.delete(&format!("/api/connected-accounts/{}", id)).await?;
            println!("Disconnected account: {}", id);
        }
    }

    Ok(())
}

async fn handle_mappings(api: &Api, action: MappingAction) -> anyhow::Result<()> {
    match action {
        MappingAction::List { account } => {
            let mappings: Vec<CalendarMappingResponse> = api
                .get(&format!("/api/connected-accounts/{}/mappings", account))
                .await?;
            if mappings.is_empty() {
                println!("No calendar mappings. Try 'accounts discover'.");
            } else {
                for mapping in mappings {
                    let marker = if mapping.sync_enabled { "●" } else { "○" };
                    println!(
                        "{} [{}] {} ({})",
                        marker,
                        short(&mapping.id),
                        mapping.provider_calendar_name,
                        mapping.provider_calendar_id
                    );
                    if let Some(error) = &mapping.last_sync_error {
                        println!("    Last error: {}", error);
                    }
                }
            }
        }
        MappingAction::Sync { id } => {
            let report: SyncReport = api
                .post(&format!("/api/calendar-mappings/{}/sync", id))
                .await?;
            println!(
                "Imported {}, updated {}, cancelled {}, skipped {}, failed {} ({} seen)",
                report.imported,
                report.updated,
                report.cancelled,
                report.skipped,
                report.failed,
                report.total_seen
            );
            if report.cursor_reset {
                println!("Sync cursor was rejected; run sync again for a full window import.");
            }
        }
        MappingAction::State { id } => {
            let state: SyncStateResponse = api
                .get(&format!("/api/calendar-mappings/{}/sync-state", id))
                .await?;
            println!("Status: {}", state.status.as_str());
            println!("Cursor: {}", if state.has_cursor { "yes" } else { "no" });
            match state.last_sync_at {
                Some(at) => println!("Last sync: {}", at.to_rfc3339()),
                None => println!("Last sync: never"),
            }
            if let Some(error) = state.last_sync_error {
                println!("Last error: {}", error);
            }
        }
        MappingAction::Toggle { id } => {
            let mapping: CalendarMappingResponse = api
                .post(&format!("/api/calendar-mappings/{}/toggle", id))
                .await?;
            let state = if mapping.sync_enabled {
                "enabled"
            } else {
                "disabled"
            };
            println!(
                "Sync {} for [{}] {}",
                state,
                short(&mapping.id),
                mapping.provider_calendar_name
            );
        }
    }

    Ok(())
}
