//! Axum HTTP server.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use planloop_core::error::PlanloopError;

use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub messages: String,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub response: String,
    pub truncated: bool,
    pub steps: u32,
    pub actions: usize,
}

/// Error body: `{"error", "kind", "stage"}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    kind: &'static str,
    stage: Option<String>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            kind: "invalid_request",
            stage: None,
        }
    }
}

impl From<PlanloopError> for ApiError {
    fn from(e: PlanloopError) -> Self {
        let status = match e {
            PlanloopError::Completion { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
            kind: e.kind(),
            stage: e.stage().map(|s| s.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.message,
            "kind": self.kind,
            "stage": self.stage,
        });
        (self.status, Json(body)).into_response()
    }
}

/// Build the router. Exposed separately so tests can serve it on any listener.
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/", post(ask_handler))
        .route("/health", get(health_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Start the HTTP server and serve until Ctrl-C.
pub async fn start_gateway(state: Arc<GatewayState>, port: u16) -> anyhow::Result<()> {
    let bind_addr = state.config.gateway_bind();
    let app = router(state);

    let addr = format!("{bind_addr}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn ask_handler(
    State(state): State<Arc<GatewayState>>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let query = request.messages.trim();
    if query.is_empty() {
        return Err(ApiError::bad_request("`messages` must be a non-empty query"));
    }

    let outcome = state.runtime().run(query).await?;
    Ok(Json(AskResponse {
        response: outcome.answer,
        truncated: outcome.truncated,
        steps: outcome.steps,
        actions: outcome.state.actions_taken.len(),
    }))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(%e, "Failed to listen for Ctrl-C");
        return;
    }
    info!("Shutdown signal received");
}
