//! # Orgdesk API Server
//!
//! Serves user registration and profile management, organizations, and
//! organization membership over JSON/HTTP.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p orgdesk-api
//! ```

use std::sync::Arc;

use orgdesk_api::{
    app::{build_router, AppState},
    config::Config,
};
use orgdesk_shared::{
    auth::middleware::TokenVerifier,
    db::{
        pool::{close_pool, create_pool, DatabaseConfig},
        PgExecutor,
    },
    events::{spawn_event_logger, BroadcastEventSink},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "orgdesk_api=debug,orgdesk_shared=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Orgdesk API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;

    let events = Arc::new(BroadcastEventSink::new(EVENT_CHANNEL_CAPACITY));
    let event_logger = spawn_event_logger(events.subscribe());

    let verifier = match &config.auth.shared_secret {
        Some(secret) => {
            tracing::warn!("AUTH_SHARED_SECRET is set; verifying HS256 tokens locally");
            TokenVerifier::shared_secret(config.token_settings(), secret)
        }
        None => TokenVerifier::jwks(config.token_settings()),
    };

    let address = config.bind_address();
    let state = AppState::new(
        Arc::new(PgExecutor::new(pool.clone())),
        events,
        verifier,
        config,
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown signal received, closing connections...");
    close_pool(pool).await;
    event_logger.abort();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
