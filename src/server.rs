//! Registration HTTP Server
//!
//! Wires the pieces together and serves them:
//! ```text
//! ServerConfig
//!  ├── store:    PgStorage (DATABASE_URL) | LocalStorage (SQLite under data_dir)
//!  ├── limiter:  RateLimiter (+ background purge of expired windows)
//!  └── router:   /register, /registrations, /registrations/:id,
//!                /registrations/export, /stats, /health
//! ```

use crate::api::{routes, ApiState};
use crate::clock::{Clock, SystemClock};
use crate::config::ServerConfig;
use crate::pipeline::RegistrationPipeline;
use crate::rate_limit::RateLimiter;
use crate::storage::{LocalStorage, PgStorage, RegistrationStore};
use anyhow::{Context, Result};
use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// How often expired rate limit windows are dropped
pub const RATE_LIMIT_PURGE_INTERVAL: Duration = Duration::from_secs(60);

// ============================================================================
// ROUTER
// ============================================================================

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(routes::health_check))
        .route("/register", post(routes::register))
        .route("/registrations", get(routes::list_registrations))
        .route("/registrations/export", get(routes::export_registrations))
        .route("/registrations/:id", get(routes::get_registration))
        .route("/stats", get(routes::get_stats))
        .with_state(state)
}

pub fn cors_layer(origin: Option<&str>) -> Result<CorsLayer> {
    let allow_origin = match origin {
        Some(origin) => AllowOrigin::exact(
            HeaderValue::from_str(origin).with_context(|| format!("invalid CORS origin {}", origin))?,
        ),
        None => AllowOrigin::from(Any),
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60)))
}

// ============================================================================
// SERVER STARTUP
// ============================================================================

pub async fn open_store(config: &ServerConfig) -> Result<Arc<dyn RegistrationStore>> {
    match &config.database_url {
        Some(url) => {
            let storage = PgStorage::new(url)
                .await
                .context("failed to initialize PostgreSQL storage")?;
            Ok(Arc::new(storage))
        }
        None => {
            let path = config.sqlite_path();
            let storage = LocalStorage::open(&path)
                .with_context(|| format!("failed to open SQLite storage at {:?}", path))?;
            Ok(Arc::new(storage))
        }
    }
}

pub async fn run_server(config: ServerConfig) -> Result<()> {
    config.rate_limit.validate()?;

    let store = open_store(&config).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let limiter = Arc::new(RateLimiter::new(config.rate_limit, clock.clone()));
    let purge = limiter.clone().spawn_purge_task(RATE_LIMIT_PURGE_INTERVAL);

    let pipeline = Arc::new(RegistrationPipeline::new(store, limiter, clock));
    let state = Arc::new(ApiState::new(pipeline, config.trust_proxy));

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config.cors_origin.as_deref())?);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("╔══════════════════════════════════════════════════════════════╗");
    info!("║              Event Registration Service                      ║");
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!("║  Listening on: {:45} ║", addr);
    info!(
        "║  Storage:      {:45} ║",
        if config.database_url.is_some() { "postgres" } else { "sqlite" }
    );
    info!(
        "║  Rate limit:   {:45} ║",
        format!(
            "{} per {}s",
            config.rate_limit.max_requests,
            config.rate_limit.window_ms / 1000
        )
    );
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!("║  Endpoints:                                                  ║");
    info!("║    POST /register              - Submit registration         ║");
    info!("║    GET  /registrations         - List registrations          ║");
    info!("║    GET  /registrations/:id     - Registration details        ║");
    info!("║    GET  /registrations/export  - CSV export                  ║");
    info!("║    GET  /stats                 - Registration counts         ║");
    info!("║    GET  /health                - Health check                ║");
    info!("╚══════════════════════════════════════════════════════════════╝");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    purge.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
