//! Song version endpoints

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chorus_common::db::SongVersion;
use chorus_common::versions;
use serde::Deserialize;

use super::auth::CurrentUser;
use super::extract::{ApiPath, ApiQuery};
use crate::{ApiError, ApiResult, AppState};

/// Comma-separated id list, e.g. `?ids=3,5,8`
#[derive(Debug, Deserialize)]
pub struct IdsQuery {
    pub ids: String,
}

pub(crate) fn parse_ids(raw: &str) -> ApiResult<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| ApiError::BadRequest(format!("ids: '{}' is not an integer", s)))
        })
        .collect()
}

/// GET /api/versions?ids=
pub async fn get_versions(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<IdsQuery>,
) -> ApiResult<Json<Vec<SongVersion>>> {
    let ids = parse_ids(&query.ids)?;
    Ok(Json(versions::get_versions_by_ids(&state.db, &ids).await?))
}

/// GET /api/versions/:id
///
/// Archived versions are still readable by id.
pub async fn get_version(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<SongVersion>> {
    Ok(Json(versions::get_version_content(&state.db, id).await?))
}

/// GET /api/versions/:id/chain
pub async fn get_chain(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vec<SongVersion>>> {
    Ok(Json(versions::version_chain(&state.db, id).await?))
}

/// POST /api/versions/:id/archive (admin)
pub async fn archive_version(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    user: CurrentUser,
) -> ApiResult<Json<SongVersion>> {
    state.admin.require_admin(user.id())?;
    Ok(Json(versions::archive_version(&state.db, id).await?))
}

/// POST /api/versions/:id/restore (admin)
pub async fn restore_version(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    user: CurrentUser,
) -> ApiResult<Json<SongVersion>> {
    state.admin.require_admin(user.id())?;
    Ok(Json(versions::restore_version(&state.db, id).await?))
}

pub fn version_routes() -> Router<AppState> {
    Router::new()
        .route("/api/versions", get(get_versions))
        .route("/api/versions/:id", get(get_version))
        .route("/api/versions/:id/chain", get(get_chain))
        .route("/api/versions/:id/archive", post(archive_version))
        .route("/api/versions/:id/restore", post(restore_version))
}
