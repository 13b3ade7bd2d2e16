use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use entries_export_api::{
    app::{create_app, AppState},
    config::Config,
    jobs::{ExportSweepJob, JobScheduler},
    middleware::{init_logging, init_metrics},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config.logging)?;
    init_metrics()?;

    info!("Starting entries export v{}", env!("CARGO_PKG_VERSION"));

    // Create database pool
    let pool = persistence::db::create_pool(&config.database.pool_config()).await?;

    // Run migrations
    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    let addr = config.socket_addr()?;
    let sweep_interval = config.export.sweep_interval_minutes;

    // Build application
    let state = AppState::new(config, pool);

    let mut scheduler = JobScheduler::new();
    scheduler.register(ExportSweepJob::new(Arc::clone(&state.export), sweep_interval));
    scheduler.start();

    let app = create_app(state);

    // Start server
    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, shutting down background jobs");
    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(30)).await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
