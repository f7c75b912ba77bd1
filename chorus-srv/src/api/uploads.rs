//! Media upload endpoint
//!
//! The returned URL is what clients store as a version's `audio_url`.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use super::auth::CurrentUser;
use super::extract::ApiPath;
use crate::{ApiError, ApiResult, AppState};

/// Largest accepted upload (bytes)
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub size: usize,
}

/// POST /api/uploads/:filename
pub async fn upload_media(
    State(state): State<AppState>,
    ApiPath(filename): ApiPath<String>,
    user: CurrentUser,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("upload body is empty".to_string()));
    }

    let url = state.blobs.put(&filename, &body).await?;
    info!("{} uploaded {} ({} bytes)", user.id(), url, body.len());

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url,
            size: body.len(),
        }),
    ))
}

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/api/uploads/:filename", post(upload_media))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
