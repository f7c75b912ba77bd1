//! Song version store
//!
//! Songs own an append-only list of versions. Editing a part never updates a
//! row: it inserts a new version whose `previous_version_id` points at the
//! version it was derived from. The only mutation is the archive flag.

use crate::db::{Song, SongVersion};
use crate::render::{is_renderable, ContentRenderer};
use crate::time;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info, warn};

/// Minimum length of `created_by`
pub const MIN_CREATED_BY_LEN: usize = 3;

/// Input for `create_song`
#[derive(Debug, Clone, Deserialize)]
pub struct NewSong {
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_by: String,
}

/// Input for `create_version`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSongVersion {
    pub song_id: i64,
    pub label: String,
    pub content: Option<String>,
    pub audio_url: Option<String>,
    pub bpm: Option<i64>,
    pub previous_version_id: Option<i64>,
    pub created_by: String,
}

pub(crate) fn validate_created_by(created_by: &str) -> Result<()> {
    if created_by.trim().chars().count() < MIN_CREATED_BY_LEN {
        return Err(Error::invalid(
            "created_by",
            format!("must be at least {} characters", MIN_CREATED_BY_LEN),
        ));
    }
    Ok(())
}

/// Tags are a set: trimmed, deduplicated, sorted, empties dropped
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ========================================
// Songs
// ========================================

pub async fn create_song(pool: &SqlitePool, new: NewSong) -> Result<Song> {
    let title = new.title.trim();
    if title.is_empty() {
        return Err(Error::invalid("title", "must not be empty"));
    }
    validate_created_by(&new.created_by)?;

    let tags = serde_json::to_string(&normalize_tags(new.tags))?;
    let row = sqlx::query(
        r#"
        INSERT INTO songs (title, tags, archived, created_by, created_at)
        VALUES (?, ?, 0, ?, ?)
        RETURNING id, title, tags, archived, created_by, created_at
        "#,
    )
    .bind(title)
    .bind(tags)
    .bind(new.created_by.trim())
    .bind(time::now_db())
    .fetch_one(pool)
    .await?;

    let song = Song::from_row(&row)?;
    info!("Created song {} '{}'", song.id, song.title);
    Ok(song)
}

pub async fn get_song(pool: &SqlitePool, song_id: i64) -> Result<Song> {
    let row = sqlx::query(
        "SELECT id, title, tags, archived, created_by, created_at FROM songs WHERE id = ?",
    )
    .bind(song_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("song {}", song_id)))?;

    Song::from_row(&row)
}

pub async fn list_songs(pool: &SqlitePool, include_archived: bool) -> Result<Vec<Song>> {
    let rows = sqlx::query(
        r#"
        SELECT id, title, tags, archived, created_by, created_at
        FROM songs
        WHERE ? OR archived = 0
        ORDER BY title COLLATE NOCASE, id
        "#,
    )
    .bind(include_archived)
    .fetch_all(pool)
    .await?;

    rows.iter().map(Song::from_row).collect()
}

pub async fn set_song_tags(pool: &SqlitePool, song_id: i64, tags: Vec<String>) -> Result<Song> {
    let tags = serde_json::to_string(&normalize_tags(tags))?;
    let result = sqlx::query("UPDATE songs SET tags = ? WHERE id = ?")
        .bind(tags)
        .bind(song_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("song {}", song_id)));
    }
    get_song(pool, song_id).await
}

async fn set_song_archived(pool: &SqlitePool, song_id: i64, archived: bool) -> Result<Song> {
    let result = sqlx::query("UPDATE songs SET archived = ? WHERE id = ?")
        .bind(archived)
        .bind(song_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("song {}", song_id)));
    }
    info!("Song {} archived={}", song_id, archived);
    get_song(pool, song_id).await
}

pub async fn archive_song(pool: &SqlitePool, song_id: i64) -> Result<Song> {
    set_song_archived(pool, song_id, true).await
}

pub async fn restore_song(pool: &SqlitePool, song_id: i64) -> Result<Song> {
    set_song_archived(pool, song_id, false).await
}

// ========================================
// Versions
// ========================================

/// Insert a new version row
///
/// Never overwrites. If the label/content signature is chord notation the
/// renderer runs first; a rendering failure is logged and the version is
/// stored without `rendered_content`.
pub async fn create_version(
    pool: &SqlitePool,
    renderer: &dyn ContentRenderer,
    new: NewSongVersion,
) -> Result<SongVersion> {
    validate_created_by(&new.created_by)?;

    let label = new.label.trim();
    if label.is_empty() {
        return Err(Error::invalid("label", "must not be empty"));
    }
    if let Some(bpm) = new.bpm {
        if bpm <= 0 {
            return Err(Error::invalid("bpm", "must be positive"));
        }
    }

    // Song must exist
    get_song(pool, new.song_id).await?;

    if let Some(previous_id) = new.previous_version_id {
        let previous_song: Option<i64> =
            sqlx::query_scalar("SELECT song_id FROM song_versions WHERE id = ?")
                .bind(previous_id)
                .fetch_optional(pool)
                .await?;
        match previous_song {
            None => {
                return Err(Error::invalid(
                    "previous_version_id",
                    format!("version {} does not exist", previous_id),
                ))
            }
            Some(song_id) if song_id != new.song_id => {
                return Err(Error::invalid(
                    "previous_version_id",
                    format!(
                        "version {} belongs to song {}, not song {}",
                        previous_id, song_id, new.song_id
                    ),
                ))
            }
            Some(_) => {}
        }
    }

    let rendered_content = match new.content.as_deref() {
        Some(content) if is_renderable(label, Some(content)) => match renderer.render(content) {
            Ok(html) => Some(html),
            Err(e) => {
                warn!(
                    "Rendering failed for song {} label '{}': {} (storing version without rendering)",
                    new.song_id, label, e
                );
                None
            }
        },
        _ => None,
    };

    let row = sqlx::query(&format!(
        r#"
        INSERT INTO song_versions (
            song_id, label, content, rendered_content, audio_url, bpm,
            previous_version_id, created_by, created_at, archived
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
        RETURNING {}
        "#,
        SongVersion::COLUMNS
    ))
    .bind(new.song_id)
    .bind(label)
    .bind(&new.content)
    .bind(&rendered_content)
    .bind(&new.audio_url)
    .bind(new.bpm)
    .bind(new.previous_version_id)
    .bind(new.created_by.trim())
    .bind(time::now_db())
    .fetch_one(pool)
    .await?;

    let version = SongVersion::from_row(&row)?;
    info!(
        "Created version {} of song {} label '{}' (previous: {:?})",
        version.id, version.song_id, version.label, version.previous_version_id
    );
    Ok(version)
}

async fn set_version_archived(pool: &SqlitePool, id: i64, archived: bool) -> Result<SongVersion> {
    let result = sqlx::query("UPDATE song_versions SET archived = ? WHERE id = ?")
        .bind(archived)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("version {}", id)));
    }
    info!("Version {} archived={}", id, archived);
    get_version_content(pool, id).await
}

/// Set archived=true; archiving an archived version is a no-op
pub async fn archive_version(pool: &SqlitePool, id: i64) -> Result<SongVersion> {
    set_version_archived(pool, id, true).await
}

pub async fn restore_version(pool: &SqlitePool, id: i64) -> Result<SongVersion> {
    set_version_archived(pool, id, false).await
}

/// Direct read by id; archived versions are returned too
pub async fn get_version_content(pool: &SqlitePool, id: i64) -> Result<SongVersion> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM song_versions WHERE id = ?",
        SongVersion::COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("version {}", id)))?;

    SongVersion::from_row(&row)
}

/// Bulk read; unknown ids are skipped, archived versions included
pub async fn get_versions_by_ids(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<SongVersion>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(&format!(
        "SELECT {} FROM song_versions WHERE id IN (SELECT value FROM json_each(?)) ORDER BY id",
        SongVersion::COLUMNS
    ))
    .bind(crate::db::ids_to_json(ids)?)
    .fetch_all(pool)
    .await?;

    debug!("Loaded {} of {} requested versions", rows.len(), ids.len());
    rows.iter().map(SongVersion::from_row).collect()
}

/// Version joined with its song title, as shown in scripts and results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionSummary {
    pub id: i64,
    pub song_id: i64,
    pub song_title: String,
    pub label: String,
    pub content: Option<String>,
    pub rendered_content: Option<String>,
    pub audio_url: Option<String>,
    pub bpm: Option<i64>,
    pub archived: bool,
}

/// Summaries keyed by version id; unknown ids are skipped
pub async fn get_version_summaries(
    pool: &SqlitePool,
    ids: &[i64],
) -> Result<BTreeMap<i64, VersionSummary>> {
    if ids.is_empty() {
        return Ok(BTreeMap::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT v.id, v.song_id, s.title AS song_title, v.label, v.content,
               v.rendered_content, v.audio_url, v.bpm, v.archived
        FROM song_versions v
        JOIN songs s ON s.id = v.song_id
        WHERE v.id IN (SELECT value FROM json_each(?))
        "#,
    )
    .bind(crate::db::ids_to_json(ids)?)
    .fetch_all(pool)
    .await?;

    let mut summaries = BTreeMap::new();
    for row in &rows {
        let summary = VersionSummary {
            id: row.try_get("id")?,
            song_id: row.try_get("song_id")?,
            song_title: row.try_get("song_title")?,
            label: row.try_get("label")?,
            content: row.try_get("content")?,
            rendered_content: row.try_get("rendered_content")?,
            audio_url: row.try_get("audio_url")?,
            bpm: row.try_get("bpm")?,
            archived: row.try_get("archived")?,
        };
        summaries.insert(summary.id, summary);
    }
    Ok(summaries)
}

/// Versions of one song in creation order
pub async fn list_versions_for_song(
    pool: &SqlitePool,
    song_id: i64,
    include_archived: bool,
) -> Result<Vec<SongVersion>> {
    get_song(pool, song_id).await?;

    let rows = sqlx::query(&format!(
        "SELECT {} FROM song_versions WHERE song_id = ? AND (? OR archived = 0) ORDER BY created_at, id",
        SongVersion::COLUMNS
    ))
    .bind(song_id)
    .bind(include_archived)
    .fetch_all(pool)
    .await?;

    rows.iter().map(SongVersion::from_row).collect()
}

/// The version and its predecessors, newest first
///
/// Follows `previous_version_id`; stops if a link repeats.
pub async fn version_chain(pool: &SqlitePool, id: i64) -> Result<Vec<SongVersion>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut next = Some(id);

    while let Some(current) = next {
        if !seen.insert(current) {
            warn!("Version chain from {} loops at {}", id, current);
            break;
        }
        let version = get_version_content(pool, current).await?;
        next = version.previous_version_id;
        chain.push(version);
    }

    Ok(chain)
}
