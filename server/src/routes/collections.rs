//! Read access to cached collections.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tedsai_engine::{CollectionName, Record};

use crate::error::{AppError, Result};
use crate::AppState;

/// Create collection routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/collections/{name}", get(list_handler))
        .route("/collections/{name}/{key}", get(get_handler))
}

/// GET /collections/{name} - Every cached record of a collection.
async fn list_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Record>>> {
    let collection: CollectionName = name.parse()?;
    Ok(Json(state.optimizer.read_collection(collection)))
}

/// GET /collections/{name}/{key} - One record, by `id` or `localId`.
async fn get_handler(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
) -> Result<Json<Record>> {
    let collection: CollectionName = name.parse()?;
    state
        .optimizer
        .cache()
        .get(collection, &key)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("{collection}/{key}")))
}
