//! Song endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chorus_common::db::{Song, SongVersion};
use chorus_common::versions::{self, NewSong, NewSongVersion};
use serde::Deserialize;

use super::auth::CurrentUser;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::{ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ArchivedQuery {
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Debug, Deserialize)]
pub struct TagsRequest {
    pub tags: Vec<String>,
}

/// Body of POST /api/songs; the author is the caller
#[derive(Debug, Deserialize)]
pub struct CreateSongRequest {
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Body of POST /api/songs/:id/versions; the song comes from the path
#[derive(Debug, Deserialize)]
pub struct CreateVersionRequest {
    pub label: String,
    pub content: Option<String>,
    pub audio_url: Option<String>,
    pub bpm: Option<i64>,
    pub previous_version_id: Option<i64>,
}

/// GET /api/songs
pub async fn list_songs(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ArchivedQuery>,
) -> ApiResult<Json<Vec<Song>>> {
    Ok(Json(versions::list_songs(&state.db, query.include_archived).await?))
}

/// POST /api/songs
pub async fn create_song(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<CreateSongRequest>,
) -> ApiResult<(StatusCode, Json<Song>)> {
    let new = NewSong {
        title: body.title,
        tags: body.tags,
        created_by: user.0,
    };
    let song = versions::create_song(&state.db, new).await?;
    Ok((StatusCode::CREATED, Json(song)))
}

/// GET /api/songs/:id
pub async fn get_song(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<Json<Song>> {
    Ok(Json(versions::get_song(&state.db, id).await?))
}

/// PUT /api/songs/:id/tags
pub async fn set_tags(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    _user: CurrentUser,
    ApiJson(body): ApiJson<TagsRequest>,
) -> ApiResult<Json<Song>> {
    Ok(Json(versions::set_song_tags(&state.db, id, body.tags).await?))
}

/// POST /api/songs/:id/archive (admin)
pub async fn archive_song(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    user: CurrentUser,
) -> ApiResult<Json<Song>> {
    state.admin.require_admin(user.id())?;
    Ok(Json(versions::archive_song(&state.db, id).await?))
}

/// POST /api/songs/:id/restore (admin)
pub async fn restore_song(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    user: CurrentUser,
) -> ApiResult<Json<Song>> {
    state.admin.require_admin(user.id())?;
    Ok(Json(versions::restore_song(&state.db, id).await?))
}

/// GET /api/songs/:id/versions
pub async fn list_versions(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<ArchivedQuery>,
) -> ApiResult<Json<Vec<SongVersion>>> {
    Ok(Json(
        versions::list_versions_for_song(&state.db, id, query.include_archived).await?,
    ))
}

/// POST /api/songs/:id/versions
pub async fn create_version(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    user: CurrentUser,
    ApiJson(body): ApiJson<CreateVersionRequest>,
) -> ApiResult<(StatusCode, Json<SongVersion>)> {
    let new = NewSongVersion {
        song_id: id,
        label: body.label,
        content: body.content,
        audio_url: body.audio_url,
        bpm: body.bpm,
        previous_version_id: body.previous_version_id,
        created_by: user.0,
    };

    let version = versions::create_version(&state.db, state.renderer.as_ref(), new).await?;
    Ok((StatusCode::CREATED, Json(version)))
}

pub fn song_routes() -> Router<AppState> {
    Router::new()
        .route("/api/songs", get(list_songs).post(create_song))
        .route("/api/songs/:id", get(get_song))
        .route("/api/songs/:id/tags", put(set_tags))
        .route("/api/songs/:id/archive", post(archive_song))
        .route("/api/songs/:id/restore", post(restore_song))
        .route("/api/songs/:id/versions", get(list_versions).post(create_version))
}
