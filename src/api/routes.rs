use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = (state.config.max_upload_size as usize).saturating_add(MULTIPART_OVERHEAD);

    let mut router = Router::new()
        // Files
        .route("/api/files", get(handlers::list_files))
        .route(
            "/api/upload",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/upload/:id", delete(handlers::delete_file))
        .route("/api/view/:id", get(handlers::view_upload))
        // Content with catalog headers
        .route("/uploads/:id", get(handlers::serve_upload))
        // Internal
        .route("/_internal/health", get(handlers::health))
        .route("/_internal/sweep", post(handlers::sweep));

    if let Some(public_dir) = &state.config.node.public_dir {
        tracing::info!("Serving static assets from: {}", public_dir);
        router = router.fallback_service(ServeDir::new(public_dir));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
