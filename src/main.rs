//! Storefront payments service entry point.

use std::sync::Arc;

use storefront_payments::adapters::http::app;
use storefront_payments::adapters::memory::InMemoryOrderRepository;
use storefront_payments::bootstrap::bootstrap;
use storefront_payments::config::AppConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    // Initialize structured tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    if config.is_production() {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    config.validate().map_err(|e| {
        tracing::error!("Invalid configuration: {e}");
        e
    })?;

    // Orders are held in process memory.
    let orders = Arc::new(InMemoryOrderRepository::new());

    let state = bootstrap(&config, orders).map_err(|e| {
        tracing::error!("Bootstrap failed: {e}");
        e
    })?;

    let app = app(state, config.server.request_timeout());

    let addr = config.server.socket_addr()?;
    tracing::info!(
        environment = ?config.server.environment,
        "Storefront payments listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
