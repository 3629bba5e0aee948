use axum::{
    http::{header, Method, StatusCode},
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod db;
pub mod error;
mod handlers;
mod models;
mod pollers;
mod provider;
mod schema;
mod store;
mod sync;

use auth::AuthConfig;
use provider::{CalendarProvider, GoogleProvider};
use store::{PgStore, SyncStore};
use sync::{CalendarDiscovery, SyncEngine, TokenManager};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SyncStore>,
    pub provider: Arc<dyn CalendarProvider>,
    pub engine: Arc<SyncEngine>,
    pub discovery: Arc<CalendarDiscovery>,
    pub auth_config: AuthConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::AppConfig::from_env()?;

    // Establish database connection pool
    let pool = db::establish_connection_pool(&config.database_url)?;

    let store: Arc<dyn SyncStore> = Arc::new(PgStore::new(pool));
    let provider: Arc<dyn CalendarProvider> = Arc::new(GoogleProvider::new(config.google)?);
    let tokens = Arc::new(TokenManager::new(store.clone(), provider.clone()));
    let engine = Arc::new(SyncEngine::new(
        store.clone(),
        provider.clone(),
        tokens.clone(),
        config.sync,
    ));
    let discovery = Arc::new(CalendarDiscovery::new(
        store.clone(),
        provider.clone(),
        tokens,
    ));

    // Start calendar polling background task
    if config.poller.enabled {
        let poll_store = store.clone();
        let poll_engine = engine.clone();
        let poll_config = config.poller.clone();
        tokio::spawn(async move {
            pollers::start_calendar_polling_task(poll_store, poll_engine, poll_config).await;
        });
    } else {
        tracing::info!("Calendar polling disabled");
    }

    let state = AppState {
        store,
        provider,
        engine,
        discovery,
        auth_config: config.auth,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// All routes. Everything under `/api` except the OAuth callback requires a
/// session token.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        // Connected account routes
        .route(
            "/api/connected-accounts",
            get(handlers::accounts::list_connected_accounts),
        )
        .route(
            "/api/connected-accounts/oauth/start",
            post(handlers::accounts::start_oauth),
        )
        .route(
            "/api/connected-accounts/:id",
            delete(handlers::accounts::disconnect_account),
        )
        .route(
            "/api/connected-accounts/:id/discover",
            post(handlers::accounts::discover_calendars),
        )
        .route(
            "/api/connected-accounts/:id/mappings",
            get(handlers::accounts::list_account_mappings),
        )
        // Calendar mapping routes
        .route(
            "/api/calendar-mappings/:id/sync",
            post(handlers::sync::trigger_sync),
        )
        .route(
            "/api/calendar-mappings/:id/sync-state",
            get(handlers::sync::get_sync_state),
        )
        .route(
            "/api/calendar-mappings/:id/toggle",
            post(handlers::sync::toggle_mapping),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/connected-accounts/oauth/callback",
            get(handlers::accounts::oauth_callback),
        )
        .merge(protected)
        .with_state(state)
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Build CORS layer based on environment configuration.
///
/// If CORS_ALLOWED_ORIGINS is set, only those origins are allowed.
/// If not set, defaults to permissive CORS (for development only).
fn build_cors_layer() -> CorsLayer {
    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS").ok();

    match allowed_origins {
        Some(origins) => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                tracing::warn!(
                    "CORS_ALLOWED_ORIGINS is set but empty, using permissive CORS (not recommended for production)"
                );
                CorsLayer::permissive()
            } else {
                tracing::info!("CORS configured for origins: {:?}", origins);
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                    .allow_credentials(true)
            }
        }
        None => {
            tracing::warn!(
                "CORS_ALLOWED_ORIGINS not set, using permissive CORS (not recommended for production)"
            );
            CorsLayer::permissive()
        }
    }
}
