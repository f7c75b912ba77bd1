//! Changelog diff summaries
//!
//! A cheap length-delta summary between a version and its predecessor, plus
//! the changed middle section between the common prefix and suffix. This is
//! not an edit distance.

use crate::db::SongVersion;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Display bound for the changed-text snippet
pub const SNIPPET_CHARS: usize = 40;

/// Display bound when one side is empty or there is no predecessor
pub const WHOLE_SIDE_CHARS: usize = 60;

/// Largest page a caller may request
pub const MAX_PAGE_SIZE: i64 = 500;

/// Diff summary; counts are in characters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionDiff {
    pub added: usize,
    pub removed: usize,
    pub added_text: String,
    pub removed_text: String,
}

fn truncate(chars: &[char], bound: usize) -> String {
    chars.iter().take(bound).collect()
}

/// Summarize `content` against `previous`; a missing content counts as empty
pub fn diff(content: Option<&str>, previous: Option<&str>) -> VersionDiff {
    let new: Vec<char> = content.unwrap_or("").chars().collect();

    let Some(previous) = previous else {
        return VersionDiff {
            added: new.len(),
            removed: 0,
            added_text: truncate(&new, WHOLE_SIDE_CHARS),
            removed_text: String::new(),
        };
    };
    let old: Vec<char> = previous.chars().collect();

    let added = new.len().saturating_sub(old.len());
    let removed = old.len().saturating_sub(new.len());

    if new == old {
        return VersionDiff::default();
    }

    if new.is_empty() || old.is_empty() {
        return VersionDiff {
            added,
            removed,
            added_text: truncate(&new, WHOLE_SIDE_CHARS),
            removed_text: truncate(&old, WHOLE_SIDE_CHARS),
        };
    }

    let prefix = new.iter().zip(&old).take_while(|(a, b)| a == b).count();
    let max_suffix = new.len().min(old.len()) - prefix;
    let suffix = new
        .iter()
        .rev()
        .zip(old.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    VersionDiff {
        added,
        removed,
        added_text: truncate(&new[prefix..new.len() - suffix], SNIPPET_CHARS),
        removed_text: truncate(&old[prefix..old.len() - suffix], SNIPPET_CHARS),
    }
}

/// Changelog query; all filters are optional and combined with AND
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangelogFilter {
    pub song_id: Option<i64>,
    /// Substring of the version's `audio_url`
    pub filename: Option<String>,
    /// Exact `created_by`
    pub username: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Changelog entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionWithDiff {
    #[serde(flatten)]
    pub version: SongVersion,
    pub song_title: String,
    pub diff: VersionDiff,
}

const CHANGELOG_COLUMNS: &str = "v.id AS id, v.song_id AS song_id, v.label AS label, \
     v.content AS content, v.rendered_content AS rendered_content, v.audio_url AS audio_url, \
     v.bpm AS bpm, v.previous_version_id AS previous_version_id, v.created_by AS created_by, \
     v.created_at AS created_at, v.archived AS archived";

/// Newest versions first, each diffed against its predecessor
///
/// Archived versions are listed; the changelog is an audit view.
pub async fn list_changelog(
    pool: &SqlitePool,
    filter: &ChangelogFilter,
    default_limit: i64,
) -> Result<Vec<VersionWithDiff>> {
    let limit = filter.limit.unwrap_or(default_limit);
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(Error::invalid(
            "limit",
            format!("must be between 1 and {}", MAX_PAGE_SIZE),
        ));
    }
    let offset = filter.offset.unwrap_or(0);
    if offset < 0 {
        return Err(Error::invalid("offset", "must not be negative"));
    }

    let filename = filter.filename.as_deref().map(str::trim).filter(|f| !f.is_empty());
    let username = filter.username.as_deref().map(str::trim).filter(|u| !u.is_empty());

    let rows = sqlx::query(&format!(
        r#"
        SELECT {}, s.title AS song_title, p.content AS previous_content
        FROM song_versions v
        JOIN songs s ON s.id = v.song_id
        LEFT JOIN song_versions p ON p.id = v.previous_version_id
        WHERE (? IS NULL OR v.song_id = ?)
          AND (? IS NULL OR instr(v.audio_url, ?) > 0)
          AND (? IS NULL OR v.created_by = ?)
        ORDER BY v.created_at DESC, v.id DESC
        LIMIT ? OFFSET ?
        "#,
        CHANGELOG_COLUMNS
    ))
    .bind(filter.song_id)
    .bind(filter.song_id)
    .bind(filename)
    .bind(filename)
    .bind(username)
    .bind(username)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    debug!("Changelog page: {} entries (limit {}, offset {})", rows.len(), limit, offset);

    rows.iter()
        .map(|row| {
            let version = SongVersion::from_row(row)?;
            let previous: Option<String> = row.try_get("previous_content")?;
            // A predecessor with null content diffs like an empty one
            let previous = match version.previous_version_id {
                Some(_) => Some(previous.unwrap_or_default()),
                None => None,
            };
            Ok(VersionWithDiff {
                diff: diff(version.content.as_deref(), previous.as_deref()),
                song_title: row.try_get("song_title")?,
                version,
            })
        })
        .collect()
}
