// HTTP surface: multipart parsing, handlers and the router

pub mod form;
pub mod handlers;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::core::types::AppState;

/// Room for form fields and multipart framing on top of the uploaded files
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Build the application router.
///
/// The body limit admits two maximum-size files plus a mask, so oversized
/// uploads reach the handler and get the JSON 413 rather than a bare one.
pub fn router(state: AppState) -> Router {
    let max_file_size = usize::try_from(state.config.max_file_size()).unwrap_or(usize::MAX);
    let body_limit = max_file_size
        .saturating_mul(3)
        .saturating_add(FORM_OVERHEAD_BYTES);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_files = ServeDir::new(state.orchestrator.layout().static_dir());

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::stats))
        .route("/gallery", get(handlers::gallery))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/generate", post(handlers::generate))
        .route("/face-swap", post(handlers::face_swap))
        .nest_service("/static", static_files)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
}
