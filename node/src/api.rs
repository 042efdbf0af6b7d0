//! HTTP control surface for a benor node
//!
//! Route names and response bodies match the legacy harness contract:
//! `/start`, `/stop`, `/status`, `/getState` and `/message`.

use crate::runtime::NodeRuntime;
use crate::wire::WireMessage;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use benor_core::BenorError;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// API state containing the node runtime
pub type ApiState = Arc<NodeRuntime>;

/// Create API router
pub fn create_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/start", get(start))
        .route("/stop", get(stop))
        .route("/status", get(status))
        .route("/getState", get(get_state))
        .route("/message", post(message))
        .with_state(state)
        .layer(cors)
}

/// Start the consensus run
async fn start(State(runtime): State<ApiState>) -> impl IntoResponse {
    match runtime.start() {
        Ok(()) => (StatusCode::OK, "consensus started"),
        Err(BenorError::AlreadyRunning) => (StatusCode::CONFLICT, "consensus already running"),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "faulty node cannot start consensus",
        ),
    }
}

/// Kill the node
async fn stop(State(runtime): State<ApiState>) -> impl IntoResponse {
    runtime.stop();
    (StatusCode::OK, "node stopped")
}

/// Node liveness
async fn status(State(runtime): State<ApiState>) -> impl IntoResponse {
    let status = runtime.status();
    let code = if status.is_live() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (code, status.as_str())
}

/// Current node state snapshot
async fn get_state(State(runtime): State<ApiState>) -> impl IntoResponse {
    Json(runtime.snapshot())
}

/// Inbound protocol message
async fn message(
    State(runtime): State<ApiState>,
    Json(wire): Json<WireMessage>,
) -> impl IntoResponse {
    let message = match wire.decode() {
        Ok(message) => message,
        Err(_) => return (StatusCode::BAD_REQUEST, "malformed message"),
    };

    match runtime.deliver(message) {
        Ok(()) => (StatusCode::OK, "message received"),
        Err(BenorError::NodeKilled) | Err(BenorError::FaultyNode) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "node is not accepting messages",
        ),
        Err(_) => (StatusCode::BAD_REQUEST, "message rejected"),
    }
}
