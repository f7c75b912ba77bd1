//! Program endpoints
//!
//! Every "current program" read goes through the same resolution in
//! `chorus_common::programs`; handlers never pick versions themselves.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chorus_common::composition::{resolve_program_script, ProgramScript};
use chorus_common::db::ProgramVersion;
use chorus_common::feedback::{resolve_program_results, ProgramResults};
use chorus_common::programs::{self, ProgramDraft, ProgramScope, ProgramStats};
use serde::Deserialize;
use std::collections::BTreeMap;

use super::auth::CurrentUser;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::versions::{parse_ids, IdsQuery};
use crate::{ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub include_subprograms: bool,
}

/// Body of POST /api/programs and PUT /api/programs/:id; the author is the
/// caller
#[derive(Debug, Deserialize)]
pub struct ProgramRequest {
    pub title: String,
    #[serde(default)]
    pub element_ids: Vec<i64>,
    #[serde(default)]
    pub program_ids: Vec<i64>,
    #[serde(default)]
    pub is_subprogram: bool,
    pub video_url: Option<String>,
    pub print_header: Option<String>,
    pub print_footer: Option<String>,
}

impl ProgramRequest {
    fn into_draft(self, user: CurrentUser) -> ProgramDraft {
        ProgramDraft {
            title: self.title,
            element_ids: self.element_ids,
            program_ids: self.program_ids,
            is_subprogram: self.is_subprogram,
            video_url: self.video_url,
            print_header: self.print_header,
            print_footer: self.print_footer,
            created_by: user.0,
        }
    }
}

/// GET /api/programs
pub async fn list_programs(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Vec<ProgramVersion>>> {
    Ok(Json(
        programs::list_active_programs(&state.db, query.include_subprograms).await?,
    ))
}

/// POST /api/programs
pub async fn create_program(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<ProgramRequest>,
) -> ApiResult<(StatusCode, Json<ProgramVersion>)> {
    let version = programs::create_program(&state.db, body.into_draft(user)).await?;
    Ok((StatusCode::CREATED, Json(version)))
}

/// GET /api/programs/stats
pub async fn program_stats(State(state): State<AppState>) -> ApiResult<Json<ProgramStats>> {
    Ok(Json(programs::program_stats(&state.db).await?))
}

/// GET /api/programs/current?ids=
///
/// Programs without versions are absent from the map.
pub async fn current_versions(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<IdsQuery>,
) -> ApiResult<Json<BTreeMap<i64, ProgramVersion>>> {
    let ids = parse_ids(&query.ids)?;
    let current = programs::resolve_current_versions(&state.db, ProgramScope::Ids(&ids)).await?;
    Ok(Json(current.into_iter().collect()))
}

/// GET /api/programs/:id
pub async fn get_program(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ProgramVersion>> {
    Ok(Json(programs::current_program_version(&state.db, id).await?))
}

/// PUT /api/programs/:id
///
/// Appends a new version; earlier versions stay in the history.
pub async fn save_program(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    user: CurrentUser,
    ApiJson(body): ApiJson<ProgramRequest>,
) -> ApiResult<Json<ProgramVersion>> {
    Ok(Json(
        programs::save_program_version(&state.db, id, body.into_draft(user)).await?,
    ))
}

/// GET /api/programs/:id/history
pub async fn program_history(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vec<ProgramVersion>>> {
    Ok(Json(programs::program_history(&state.db, id).await?))
}

/// GET /api/programs/:id/script
pub async fn program_script(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ProgramScript>> {
    Ok(Json(resolve_program_script(&state.db, id).await?))
}

/// GET /api/programs/:id/results
///
/// Anonymous callers get totals without personal fields.
pub async fn program_results(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    user: Option<CurrentUser>,
) -> ApiResult<Json<ProgramResults>> {
    let viewer = user.as_ref().map(CurrentUser::id);
    Ok(Json(resolve_program_results(&state.db, id, viewer).await?))
}

/// POST /api/programs/:id/archive (admin)
pub async fn archive_program(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    user: CurrentUser,
) -> ApiResult<Json<ProgramVersion>> {
    state.admin.require_admin(user.id())?;
    Ok(Json(programs::archive_program(&state.db, id).await?))
}

/// POST /api/programs/:id/restore (admin)
pub async fn restore_program(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    user: CurrentUser,
) -> ApiResult<Json<ProgramVersion>> {
    state.admin.require_admin(user.id())?;
    Ok(Json(programs::restore_program(&state.db, id).await?))
}

pub fn program_routes() -> Router<AppState> {
    Router::new()
        .route("/api/programs", get(list_programs).post(create_program))
        .route("/api/programs/stats", get(program_stats))
        .route("/api/programs/current", get(current_versions))
        .route("/api/programs/:id", get(get_program).put(save_program))
        .route("/api/programs/:id/history", get(program_history))
        .route("/api/programs/:id/script", get(program_script))
        .route("/api/programs/:id/results", get(program_results))
        .route("/api/programs/:id/archive", post(archive_program))
        .route("/api/programs/:id/restore", post(restore_program))
}
