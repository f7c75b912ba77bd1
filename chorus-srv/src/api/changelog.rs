//! Changelog endpoint

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use chorus_common::changelog::{list_changelog, ChangelogFilter, VersionWithDiff};

use super::extract::ApiQuery;
use crate::{ApiResult, AppState};

/// GET /api/changelog?song_id=&filename=&username=&limit=&offset=
///
/// `limit` defaults to the configured changelog page size.
pub async fn get_changelog(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ChangelogFilter>,
) -> ApiResult<Json<Vec<VersionWithDiff>>> {
    let entries = list_changelog(&state.db, &filter, state.config.changelog_page_size).await?;
    Ok(Json(entries))
}

pub fn changelog_routes() -> Router<AppState> {
    Router::new().route("/api/changelog", get(get_changelog))
}
