// HTTP routes configuration

use crate::core::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    let max_upload_bytes = state.config.server.max_upload_bytes;

    Router::new()
        .route("/api/download", post(crate::handlers::download::download_handler))
        .route("/health", get(crate::handlers::health::health_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}
