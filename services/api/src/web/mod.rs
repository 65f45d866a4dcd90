pub mod processing_task;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the handlers to make them easily accessible
// to the binary that will build the web server router.
pub use rest::{
    edit_record_at_handler, edit_record_handler, export_handler, process_handler, reset_handler,
    session_handler, stage_file_handler,
};
pub use ws_handler::ws_handler;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use state::AppState;
use std::sync::Arc;

/// Builds the API routes with the upload limit taken from the configuration.
pub fn api_router(app_state: Arc<AppState>) -> Router {
    let upload_limit = app_state.config.max_upload_bytes;
    Router::new()
        .route("/files", post(stage_file_handler))
        .route("/process", post(process_handler))
        .route("/session", get(session_handler).delete(reset_handler))
        .route("/records/{id}", put(edit_record_handler))
        .route("/records/at/{position}", put(edit_record_at_handler))
        .route("/export/{format}", get(export_handler))
        .route("/ws", get(ws_handler))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(app_state)
}
