//! Rideway Backend Server
//!
//! HTTP and WebSocket API for the customer app, the driver app and the admin
//! console.

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use rideway_server::app_config::AppConfigService;
use rideway_server::config::{Config, StorageBackend};
use rideway_server::middleware::{self, RateLimiter};
use rideway_server::notifications::{HttpPushGateway, LogPushGateway, PushGateway};
use rideway_server::state::{AppState, AppStateParts};
use rideway_server::store::{MemoryStore, PgStore, Store};
use rideway_server::users::location_sweeper;
use rideway_server::{app, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(
        environment = config.environment.as_str(),
        storage = ?config.storage_backend,
        "Starting Rideway server"
    );

    let store: Arc<dyn Store> = match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = db::connect_and_migrate(
                &config.database_url,
                &config.database_url_masked(),
                config.db_max_connections,
            )
            .await
            .context("database setup failed")?;
            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let app_config = Arc::new(
        AppConfigService::load(store.clone())
            .await
            .context("failed to load app configuration")?,
    );

    let push_gateway: Arc<dyn PushGateway> = match &config.push_gateway_url {
        Some(url) => {
            tracing::info!(url = %url, "Push gateway configured");
            Arc::new(HttpPushGateway::new(
                url.clone(),
                config.push_gateway_key.clone(),
            ))
        }
        None => {
            tracing::warn!("PUSH_GATEWAY_URL not set, push notifications will only be logged");
            Arc::new(LogPushGateway)
        }
    };

    let app_state = AppState::new(AppStateParts {
        store,
        app_config,
        push_gateway,
        jwt_secret: config.jwt_secret.clone(),
        location_stale_after: chrono::Duration::seconds(config.location_stale_after_seconds),
    });

    // Stale driver locations
    let sweeper_users = app_state.user_service.clone();
    let sweep_interval = Duration::from_secs(config.location_sweep_interval_seconds);
    tokio::spawn(async move {
        tracing::info!("Location sweeper task started");
        location_sweeper(sweeper_users, sweep_interval).await;
        tracing::error!("Location sweeper task exited unexpectedly");
    });

    let rate_limiter = RateLimiter::new(config.rate_limit_rps);
    rate_limiter.spawn_cleanup(Duration::from_secs(300));

    let mut router = app(app_state, rate_limiter).layer(configure_cors(&config));
    if config.environment.is_production() {
        router = router.layer(axum::middleware::from_fn(middleware::hsts_header));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!("Server listening on {}", addr);
    tracing::info!("WebSocket available at ws://{}/ws", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn configure_cors(config: &Config) -> CorsLayer {
    let allowed_origins_str = config.cors_allowed_origins.clone().unwrap_or_default();

    if allowed_origins_str.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins_str
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
