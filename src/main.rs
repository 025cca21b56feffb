//! ticket-realtime-gateway server entry point.
//!
//! Starts the Axum HTTP server with the WebSocket endpoint and the internal
//! event ingress.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use ticket_realtime_gateway::api;
use ticket_realtime_gateway::app_state::AppState;
use ticket_realtime_gateway::auth::JwtVerifier;
use ticket_realtime_gateway::config::{GatewayConfig, LogFormat};
use ticket_realtime_gateway::domain::EventBus;
use ticket_realtime_gateway::persistence::{
    InMemoryTicketStore, PostgresTicketStore, TicketStore,
};
use ticket_realtime_gateway::service::RealtimeService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting ticket-realtime-gateway");

    // Build persistence layer
    let store: Arc<dyn TicketStore> = if config.database_url.is_some() {
        let store = PostgresTicketStore::connect(&config)
            .await
            .context("failed to connect to the ticket database")?;
        tracing::info!("using PostgreSQL ticket store");
        Arc::new(store)
    } else {
        tracing::warn!("DATABASE_URL not set, using empty in-memory ticket store");
        Arc::new(InMemoryTicketStore::new())
    };

    // Build service layer
    let event_bus = EventBus::new(config.event_bus_capacity);
    let realtime = RealtimeService::new(event_bus, store);

    if config.internal_api_key.is_none() {
        tracing::warn!("INTERNAL_API_KEY not set, event ingress is unauthenticated");
    }

    // Build application state
    let app_state = AppState {
        realtime,
        jwt: JwtVerifier::new(config.jwt_secret.clone()),
        internal_api_key: config.internal_api_key.as_deref().map(Arc::from),
    };

    let app = api::build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
