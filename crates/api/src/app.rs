use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use domain::services::{MemoryTransientStore, TransientStore};
use persistence::repositories::{EntryRepository, FormRepository, TransientRepository};
use shared::nonce::NonceIssuer;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::config::{Config, TransientBackend};
use crate::middleware::{metrics_handler, metrics_middleware, security_headers_middleware};
use crate::routes::{export, health};
use crate::services::{EntriesExport, ExportSettings};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub export: Arc<EntriesExport>,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool) -> Self {
        let export = Arc::new(build_export(&config, &pool));
        Self {
            pool,
            config: Arc::new(config),
            export,
        }
    }
}

/// Assembles the export service over the Postgres repositories.
pub fn build_export(config: &Config, pool: &PgPool) -> EntriesExport {
    let transients: Arc<dyn TransientStore> = match config.export.transient_backend {
        TransientBackend::Database => Arc::new(TransientRepository::new(pool.clone())),
        TransientBackend::Memory => Arc::new(MemoryTransientStore::new()),
    };
    info!(backend = ?config.export.transient_backend, "Export transient store selected");

    EntriesExport::new(
        Arc::new(EntryRepository::new(pool.clone())),
        Arc::new(FormRepository::new(pool.clone())),
        transients,
        NonceIssuer::new(
            config.security.nonce_secret.clone(),
            config.security.nonce_lifetime_secs,
        ),
        config.export.defaults(),
        ExportSettings::from(&config.export),
    )
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Probes and metrics answer within the request timeout.
    let timed_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )));

    // Export steps and downloads run without a time budget.
    let export_routes = Router::new()
        .route("/api/v1/tools/export", get(export::export_page))
        .route("/api/v1/tools/export/ajax", post(export::export_ajax));

    Router::new()
        .merge(timed_routes)
        .merge(export_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}
