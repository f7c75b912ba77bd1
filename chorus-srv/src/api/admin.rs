//! Admin-only endpoints

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use chorus_common::feedback::{feedback_by_user, UserFeedback};

use super::auth::CurrentUser;
use super::extract::ApiPath;
use crate::{ApiResult, AppState};

/// GET /api/admin/programs/:id/feedback
///
/// Feedback across the program grouped by user, voter ids included.
pub async fn program_feedback(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<UserFeedback>>> {
    Ok(Json(
        feedback_by_user(&state.db, state.admin.as_ref(), user.id(), id).await?,
    ))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/api/admin/programs/:id/feedback", get(program_feedback))
}
