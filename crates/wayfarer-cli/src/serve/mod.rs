//! The `wayfarer serve` command: the HTTP API.
//!
//! Every endpoint speaks one JSON envelope convention: success bodies carry
//! `success: true`, error bodies `{success: false, message, error?,
//! errorDetails?}`. `error` is a stable discriminator; `errorDetails` is
//! attached only when the server runs in the development environment.

mod ai;
mod auth;
mod extract;
mod plans;

#[cfg(test)]
pub mod test_helpers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;

use wayfarer_core::token::TokenConfig;
use wayfarer_core::upstream::TextGenerator;

use crate::config::Environment;

pub use extract::CurrentUser;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Per-request handler context. Cheap to clone; the generator is shared.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub tokens: TokenConfig,
    pub generator: Arc<dyn TextGenerator>,
    pub environment: Environment,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// The one error type handlers return; rendering it produces the JSON error
/// envelope.
pub struct ApiError {
    status: StatusCode,
    message: String,
    error: Option<&'static str>,
    details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error: None,
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// An unexpected failure: logged in full, surfaced as a generic 500.
    pub fn internal(err: anyhow::Error) -> Self {
        tracing::error!(error = format!("{err:#}"), "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }

    /// Attach the stable wire discriminator.
    pub fn with_discriminator(mut self, discriminator: &'static str) -> Self {
        self.error = Some(discriminator);
        self
    }

    /// Attach diagnostic detail, but only in the development environment.
    pub fn with_dev_details(mut self, environment: Environment, details: Value) -> Self {
        if environment.is_development() {
            self.details = Some(details);
        }
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let mut body = json!({
            "success": false,
            "message": self.message,
        });
        if let Some(discriminator) = self.error {
            body["error"] = json!(discriminator);
        }
        if let Some(details) = self.details {
            body["errorDetails"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

/// Deserialize a request body that was taken as raw JSON, mapping failures
/// into the 400 envelope instead of axum's default rejection.
fn parse_body<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|err| ApiError::bad_request(format!("Invalid request body: {err}")))
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/auth/me", get(auth::get_me).put(auth::update_me))
        .route("/api/auth/api-keys/dashscope", put(auth::save_api_key))
        .route(
            "/api/auth/api-keys/dashscope/status",
            get(auth::api_key_status),
        )
        .route("/api/plans", get(plans::list).post(plans::create))
        .route(
            "/api/plans/{id}",
            get(plans::detail).put(plans::update).delete(plans::remove),
        )
        .route("/api/plans/{id}/schedule", put(plans::replace_schedule))
        .route("/api/plans/{id}/budget", post(plans::add_budget_item))
        .route(
            "/api/plans/{id}/budget/{item_id}",
            put(plans::update_budget_item).delete(plans::delete_budget_item),
        )
        .route("/api/ai/generate-plan", post(ai::generate_plan))
        .route("/api/ai/validate-api-key", post(ai::validate_api_key))
        .route("/api/ai/process-voice", post(ai::process_voice))
        .route("/api/ai/analyze-budget", post(ai::analyze_budget))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let environment = state.environment;
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!(%environment, "wayfarer serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("wayfarer serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}

// ---------------------------------------------------------------------------
// Root handlers
// ---------------------------------------------------------------------------

async fn index() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "wayfarer travel planning API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "auth": "/api/auth",
            "plans": "/api/plans",
            "ai": "/api/ai",
        },
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "service healthy",
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
