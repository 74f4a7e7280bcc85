use anyhow::Result;
use axum::serve;
use cardhub_api::{bootstrap, create_app, AppState};
use cardhub_database::initialize_database;
use cardhub_utils::{init_logging, AppConfig};
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration ({e}), using defaults");
        AppConfig::default()
    });

    // Initialize logging
    init_logging(&config.logging)?;
    info!("Starting CardHub API");

    // Initialize database
    let db_config = cardhub_database::DatabaseConfig {
        postgres_url: config.database.postgres_url.clone(),
        max_connections: config.database.max_connections,
        connection_timeout: std::time::Duration::from_secs(config.database.connection_timeout_seconds),
    };
    let pool = initialize_database(&db_config).await?;
    info!("Database connection established");

    bootstrap::ensure_owner(&pool, &config.auth).await?;

    let state = AppState::new(pool, config.clone())?;
    state.storage.ensure_root().await?;

    // Build application router
    let app = create_app(state);

    // Start server
    let host: IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::new(host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("CardHub API listening on {}", addr);

    serve(listener, app).await?;

    Ok(())
}
