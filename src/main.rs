use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use places_api::config::AppConfig;
use places_api::database::{DatabaseManager, PgStore};
use places_api::geocoding::GoogleGeocoder;
use places_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_KEY, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("places_api=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env();
    tracing::info!("Starting places API in {:?} mode", config.environment);
    if config.security.jwt_secret.is_empty() {
        tracing::warn!("JWT_KEY is not set; signup and login will fail until it is");
    }

    let pool = DatabaseManager::connect_lazy(&config.database).context("invalid database configuration")?;
    if config.database.run_migrations {
        DatabaseManager::migrate(&pool).await.context("running migrations failed")?;
    }

    let geocoder = GoogleGeocoder::new(&config.geocoding).context("invalid geocoding endpoint")?;
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(Arc::new(PgStore::new(pool.clone())), Arc::new(geocoder), config);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Places API listening on http://{}", bind_addr);

    axum::serve(listener, places_api::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    DatabaseManager::close(&pool).await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
