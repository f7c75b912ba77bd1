//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub schema_version: i32,
    pub schema_current: bool,
}

/// GET /health
///
/// Reports the schema version resolved at startup; no database round trip.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "chorus-srv".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: state.schema.version,
        schema_current: state.schema.is_current(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
