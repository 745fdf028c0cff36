//! Slotbook Server
//!
//! Main server process for the reservation ledger.
//!
//! This binary:
//! - Connects to `PostgreSQL` and bootstraps the ledger schema
//! - Wires the booking coordinator and query surface
//! - Exposes the HTTP API and a Prometheus metrics endpoint
//! - Runs until Ctrl+C
//!
//! # Usage
//!
//! ```bash
//! # Start infrastructure
//! docker compose up -d
//!
//! # Run server
//! cargo run --bin server
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use slotbook_ledger::LedgerEnvironment;
use slotbook_postgres::{run_migrations, PostgresReservationStore};
use slotbook_web::{router, AppState, Config};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,slotbook=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Slotbook server...");

    // Load configuration
    let config = Config::from_env();
    tracing::info!(postgres = %config.postgres.url, "Configuration loaded");

    // Metrics exporter
    let metrics_addr: SocketAddr =
        format!("{}:{}", config.server.metrics_host, config.server.metrics_port).parse()?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()?;
    tracing::info!(%metrics_addr, "✓ Metrics exporter listening");

    // Connect to the reservation store
    let pool = PgPoolOptions::new()
        .max_connections(config.postgres.max_connections)
        .min_connections(config.postgres.min_connections)
        .acquire_timeout(Duration::from_secs(config.postgres.connect_timeout))
        .connect(&config.postgres.url)
        .await?;
    run_migrations(&pool).await?;
    tracing::info!("✓ Reservation store ready");

    // Wire the application
    let store = Arc::new(PostgresReservationStore::new(pool));
    let state = AppState::new(store, LedgerEnvironment::live());
    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Slotbook server is running");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down gracefully...");
        })
        .await?;

    Ok(())
}
