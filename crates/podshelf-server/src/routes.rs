// ABOUTME: Route table and serve loop for the podshelf HTTP API.
// ABOUTME: Assembles all API routes into a single Axum Router with shared state and request tracing.

use std::future::Future;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;
use crate::error::ApiError;

/// Build the complete Axum router with all routes and shared state.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/records",
            get(api::records::list_records).post(api::records::create_record),
        )
        .route("/api/records/export", get(api::records::export_records))
        .route(
            "/api/records/{id}",
            get(api::records::get_record)
                .put(api::records::update_record)
                .delete(api::records::delete_record),
        )
        .route(
            "/api/feeds",
            get(api::feeds::list_feeds).post(api::feeds::create_feed),
        )
        .route(
            "/api/feeds/{id}",
            get(api::feeds::get_feed)
                .put(api::feeds::update_feed)
                .delete(api::feeds::delete_feed),
        )
        .route("/api/feeds/{id}/episodes", get(api::feeds::list_episodes))
        .route("/api/feeds/{id}/refresh", post(api::feeds::refresh_feed))
        .route("/api/episodes/{id}", get(api::episodes::get_episode))
        .route(
            "/api/episodes/{id}/progress",
            put(api::episodes::update_progress),
        )
        .route("/api/episodes/{id}/played", put(api::episodes::toggle_played))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router on `listener` until `shutdown` resolves and in-flight requests drain.
pub async fn serve<F>(listener: TcpListener, state: SharedState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Health check handler. Runs a trivial query so a broken database reports 503.
async fn health(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    state.storage.health_check().await?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "no such route", "code": "not_found" })),
    )
}
