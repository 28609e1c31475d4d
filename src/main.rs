//! DHIS2 ↔ RapidPro Bridge
//!
//! Periodically moves data between a DHIS2 instance and a RapidPro workspace
//! and exposes a token-authenticated webhook endpoint RapidPro calls back
//! into. Management and trigger paths are operator-authenticated.

use std::sync::Arc;

use sqlx::sqlite::SqlitePool;
use tokio::net::TcpListener;

mod api;
mod auth;
mod config;
mod connectivity;
mod error;
mod logging;
mod storage;
mod sync;

use crate::api::build_router;
use crate::api::policy::RouteAccessPolicy;
use crate::auth::{SessionStore, TokenProvisioner, UserStore};
use crate::config::{Config, ManagementAuthMode, WebhookAuthMode};
use crate::connectivity::ConnectionProbe;
use crate::storage::BridgeRepository;
use crate::sync::SyncService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database repository.
    pub repository: BridgeRepository,
    /// Lazy webhook token provisioner.
    pub provisioner: TokenProvisioner,
    /// Active operator sessions.
    pub sessions: SessionStore,
    /// Configured operator users.
    pub users: UserStore,
    /// Route access policy, built once at startup.
    pub policy: Arc<RouteAccessPolicy>,
    /// Boundary to the sync pipeline.
    pub sync: SyncService,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if present)
    // This is optional and won't fail if .env doesn't exist
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Note: No .env file loaded ({e})");
    }

    // Initialize logging
    logging::init();

    tracing::info!("Starting DHIS2 RapidPro Bridge v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration; a malformed configuration refuses to serve traffic
    let config = Config::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;
    config.validate().map_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        database = %config.database.url,
        management_auth = ?config.auth.management,
        webhook_auth = ?config.auth.webhook,
        "Configuration loaded"
    );

    // Connect to database
    let pool = SqlitePool::connect(&config.database.url)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to database");
            anyhow::anyhow!("Database connection error: {}", e)
        })?;

    // Initialize repository and schema
    let repository = BridgeRepository::new(pool);
    repository.init_schema().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize database schema");
        anyhow::anyhow!("Schema initialization error: {}", e)
    })?;

    tracing::info!("Database connected and schema initialized");

    // Probe both platforms before exposing any endpoint
    let probe = ConnectionProbe::new(config.dhis2.clone(), config.rapidpro.clone());
    probe.test_dhis2_connection().await.map_err(|e| {
        tracing::error!(error = %e, "DHIS2 connection test failed");
        e
    })?;
    probe.test_rapidpro_connection().await.map_err(|e| {
        tracing::error!(error = %e, "RapidPro connection test failed");
        e
    })?;

    // Build authentication components and the route access policy
    if config.auth.webhook == WebhookAuthMode::None {
        tracing::warn!(
            "Webhook endpoint is UNAUTHENTICATED - set `auth.webhook` to `token` for production"
        );
    }
    if config.auth.management == ManagementAuthMode::None {
        tracing::warn!("Management auth is DISABLED - enable for production");
    }
    let policy = Arc::new(RouteAccessPolicy::from_config(&config.auth));

    // Build application state
    let state = AppState {
        repository: repository.clone(),
        provisioner: TokenProvisioner::new(repository.clone()),
        sessions: SessionStore::new(),
        users: UserStore::new(config.auth.users.clone()),
        policy,
        sync: SyncService::new(repository),
    };

    // Build router
    let app = build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!(address = %addr, "Server listening");
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
