//! Campus Reserve - reservation core daemon
//!
//! Hydrates the reservation ledger from the external facilities store and
//! keeps it authoritative: serves commands to embedding collaborators and
//! runs the expiry sweeper until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campus_reserve::{
    config::AppConfig,
    repository::rest::RestStore,
    services::{ExpirySweeper, ReservationsService},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("campus_reserve={}", config.logging.level).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Campus Reserve v{}", env!("CARGO_PKG_VERSION"));

    // Connect to the external reservation store
    let store = RestStore::new(&config.backend).expect("Failed to build backend client");
    tracing::info!(base_url = %config.backend.base_url, "Using reservation backend");

    // Hydrate the ledger from server truth
    let service = ReservationsService::bootstrap(Arc::new(store), config.policy.clone()).await?;
    tracing::info!("Reservation ledger hydrated");

    // Start the expiry sweeper
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = ExpirySweeper::new(
        service.clone(),
        Duration::from_secs(config.sweeper.interval_seconds),
    );
    let sweeper_handle = sweeper.spawn(shutdown_rx);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    shutdown_tx.send(true).ok();
    sweeper_handle.await?;

    Ok(())
}
