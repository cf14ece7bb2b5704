//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the HTTP and websocket endpoints under a single Axum
//! router. Room bookkeeping and the two proxies are plain JSON routes; the
//! shared state tree is reached through `/api/ws`. When a static directory
//! is configured, the browser client is served from it at `/`.

pub mod proxy;
pub mod rooms;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// API routes shared by every deployment.
fn api_routes(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/rooms", post(rooms::create_room))
        .route("/api/rooms/{id}", get(rooms::get_room))
        .route("/api/rooms/{id}/auth", post(rooms::authorize))
        .route("/api/run", post(proxy::run_code))
        .route("/api/ai", post(proxy::explain_code))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .with_state(state)
}

/// Full application router: API routes, request tracing and, when
/// `STATIC_DIR` is set, the static client as fallback.
pub fn app(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();
    let router = api_routes(state);
    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true)),
        None => router,
    };
    router.layer(TraceLayer::new_for_http())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
