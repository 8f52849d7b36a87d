//! HTTP route definitions.

mod collections;
mod health;
mod maintenance;

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(maintenance::routes())
        .merge(collections::routes())
}
