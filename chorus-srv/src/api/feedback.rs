//! Vote and comment endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chorus_common::db::{Comment, PublicVote, Vote, VoteCategory, VoteType, VoteWeight};
use chorus_common::feedback::{self, NewVote, VoteSummary};
use chorus_common::versions;
use serde::{Deserialize, Serialize};

use super::auth::CurrentUser;
use super::extract::{ApiJson, ApiPath};
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub weight: VoteWeight,
    #[serde(rename = "type")]
    pub vote_type: VoteType,
    pub category: VoteCategory,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

/// Carried-forward feedback for one version, without voter ids
#[derive(Debug, Serialize)]
pub struct VersionFeedbackResponse {
    pub summary: VoteSummary,
    pub votes: Vec<PublicVote>,
    pub comments: Vec<Comment>,
}

/// GET /api/versions/:id/feedback
pub async fn version_feedback(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    user: Option<CurrentUser>,
) -> ApiResult<Json<VersionFeedbackResponse>> {
    versions::get_version_content(&state.db, id).await?;
    let mut grouped = feedback::collect_feedback(&state.db, &[id]).await?;
    let group = grouped.remove(&id).unwrap_or_default();

    let viewer = user.as_ref().map(CurrentUser::id);
    Ok(Json(VersionFeedbackResponse {
        summary: feedback::summarize_votes(id, &group.votes, viewer),
        votes: group.votes.iter().map(Vote::to_public).collect(),
        comments: group.comments,
    }))
}

/// PUT /api/versions/:id/votes
pub async fn upsert_vote(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    user: CurrentUser,
    ApiJson(body): ApiJson<VoteRequest>,
) -> ApiResult<Json<Vote>> {
    let vote = feedback::upsert_vote(
        &state.db,
        NewVote {
            version_id: id,
            user_id: user.0,
            weight: body.weight,
            vote_type: body.vote_type,
            category: body.category,
        },
    )
    .await?;
    Ok(Json(vote))
}

/// DELETE /api/versions/:id/votes/:category
pub async fn delete_vote(
    State(state): State<AppState>,
    ApiPath((id, category)): ApiPath<(i64, VoteCategory)>,
    user: CurrentUser,
) -> ApiResult<StatusCode> {
    feedback::delete_vote(&state.db, id, user.id(), category).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/versions/:id/votes/mine
pub async fn my_votes(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<Vote>>> {
    Ok(Json(feedback::user_votes_for_version(&state.db, id, user.id()).await?))
}

/// POST /api/versions/:id/comments
pub async fn add_comment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    user: CurrentUser,
    ApiJson(body): ApiJson<CommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let comment = feedback::add_comment(&state.db, id, user.id(), &body.content).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/versions/:id/comments/mine
pub async fn my_comments(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<Comment>>> {
    Ok(Json(
        feedback::user_comments_for_version(&state.db, id, user.id()).await?,
    ))
}

/// PUT /api/comments/:id
pub async fn update_comment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    user: CurrentUser,
    ApiJson(body): ApiJson<CommentRequest>,
) -> ApiResult<Json<Comment>> {
    Ok(Json(
        feedback::update_comment(&state.db, id, user.id(), &body.content).await?,
    ))
}

/// DELETE /api/comments/:id
pub async fn delete_comment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    user: CurrentUser,
) -> ApiResult<StatusCode> {
    feedback::delete_comment(&state.db, id, user.id()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn feedback_routes() -> Router<AppState> {
    use axum::routing::{delete, post};

    Router::new()
        .route("/api/versions/:id/feedback", get(version_feedback))
        .route("/api/versions/:id/votes", put(upsert_vote))
        .route("/api/versions/:id/votes/mine", get(my_votes))
        .route("/api/versions/:id/votes/:category", delete(delete_vote))
        .route("/api/versions/:id/comments", post(add_comment))
        .route("/api/versions/:id/comments/mine", get(my_comments))
        .route("/api/comments/:id", put(update_comment).delete(delete_comment))
}
