//! TEDSAI Server - hosts the cache optimizer for the site's data collections.
//!
//! The local cache lives in a directory of files, the remote document store
//! in PostgreSQL. The optimizer's timers run for the lifetime of the process;
//! a small HTTP API triggers passes on demand and exposes statistics.

mod config;
mod db;
mod error;
mod routes;

use crate::config::Config;
use crate::db::PgRemoteStore;
use axum::Router;
use std::sync::Arc;
use tedsai_engine::{DatabaseOptimizer, FileStore, OptimizerConfig, SystemClock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub optimizer: Arc<DatabaseOptimizer>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tedsai_server=debug,tedsai_engine=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting TEDSAI Server on {}:{}", config.host, config.port);

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    let remote = Arc::new(PgRemoteStore::new(pool));
    remote.mark_ready();

    // Local cache
    let store = Arc::new(FileStore::open(&config.data_dir)?);
    tracing::info!("Local cache at {}", config.data_dir.display());

    let optimizer = Arc::new(DatabaseOptimizer::new(
        store.clone(),
        remote,
        Arc::new(SystemClock),
    ));
    if config.has_overrides() {
        let settings = config.apply_to(OptimizerConfig::load(store.as_ref()));
        optimizer.update_settings(settings).await?;
    }
    optimizer.init();

    // Build router
    let state = AppState {
        optimizer: optimizer.clone(),
    };
    let app = Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    optimizer.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
