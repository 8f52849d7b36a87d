//! On-demand maintenance endpoints: sync, cleanup, statistics, backups and
//! settings.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tedsai_engine::{CleanupReport, OptimizerConfig, StorageStats, SyncReport};

use crate::error::{AppError, Result};
use crate::AppState;

/// Create maintenance routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats_handler))
        .route("/sync", post(sync_handler))
        .route("/cleanup", post(cleanup_handler))
        .route("/backup", post(backup_handler))
        .route("/backup/restore", post(restore_handler))
        .route("/export", get(export_handler))
        .route("/settings", get(get_settings).put(put_settings))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupResponse {
    pub timestamp: String,
    pub version: String,
    pub records: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResponse {
    pub collections: usize,
}

/// GET /stats - Storage usage and recommendations.
async fn stats_handler(State(state): State<AppState>) -> Json<StorageStats> {
    Json(state.optimizer.stats())
}

/// POST /sync - Run a sync pass now.
async fn sync_handler(State(state): State<AppState>) -> Json<SyncReport> {
    Json(state.optimizer.sync_now().await)
}

/// POST /cleanup - Run a cleanup pass now.
async fn cleanup_handler(State(state): State<AppState>) -> Json<CleanupReport> {
    Json(state.optimizer.cleanup_now().await)
}

/// POST /backup - Snapshot every collection.
async fn backup_handler(State(state): State<AppState>) -> Result<Json<BackupResponse>> {
    let backup = state.optimizer.create_backup()?;
    Ok(Json(BackupResponse {
        records: backup.record_count(),
        timestamp: backup.timestamp,
        version: backup.version,
    }))
}

/// POST /backup/restore - Write the stored backup back.
async fn restore_handler(State(state): State<AppState>) -> Result<Json<RestoreResponse>> {
    let collections = state.optimizer.restore_backup().await?;
    Ok(Json(RestoreResponse { collections }))
}

/// GET /export - Every collection as a downloadable JSON document.
async fn export_handler(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let json = state.optimizer.export_json()?;
    Ok(([(header::CONTENT_TYPE, "application/json")], json))
}

async fn get_settings(State(state): State<AppState>) -> Json<OptimizerConfig> {
    Json(state.optimizer.config())
}

/// PUT /settings - Update settings and restart the timers.
///
/// Fields missing from the body keep their current value.
async fn put_settings(
    State(state): State<AppState>,
    Json(patch): Json<Map<String, Value>>,
) -> Result<Json<OptimizerConfig>> {
    let settings = state
        .optimizer
        .config()
        .with_overrides(patch)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if settings.sync_interval == 0 || settings.cleanup_interval == 0 || settings.monitor_interval == 0
    {
        return Err(AppError::BadRequest(
            "intervals must be greater than zero".to_string(),
        ));
    }

    state.optimizer.update_settings(settings).await?;
    Ok(Json(state.optimizer.config()))
}
