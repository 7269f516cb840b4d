use crate::controllers::{blob, guest, health, websocket};
use crate::middleware::create_cors_layer;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let cors = create_cors_layer(&state.config.cors);
    let upload_limit = state.config.blobs.max_blob_bytes + 1;
    let ws_path = state.config.server.ws_path.clone();

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/stats", get(health::presence_stats))
        .route("/api/guest", post(guest::create_guest))
        .route(
            "/api/blobs",
            post(blob::upload_blob).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/blobs/:id", get(blob::get_blob))
        .route("/api/blobs/:id/download", get(blob::download_blob))
        .route("/api/storage/stats", get(blob::storage_stats))
        .route(&ws_path, get(websocket::handle_websocket))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
