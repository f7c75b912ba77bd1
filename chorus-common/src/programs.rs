//! Program versions and current-version resolution
//!
//! Every program edit inserts a new `program_versions` row. The current
//! version of a program is the row with the latest `created_at`, ties going
//! to the highest id. That rule lives in exactly one query,
//! `resolve_current_versions`, which every listing, stats, script, results
//! and feedback path goes through.

use crate::db::{ids_to_json, Program, ProgramVersion};
use crate::time;
use crate::versions::validate_created_by;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Editable fields of a program version
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgramDraft {
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
    pub created_by: String,
}

/// Which programs to resolve
#[derive(Debug, Clone, Copy)]
pub enum ProgramScope<'a> {
    Ids(&'a [i64]),
    All,
}

/// Counts over current program versions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgramStats {
    pub total: i64,
    pub active: i64,
    pub archived: i64,
    pub subprograms: i64,
}

/// Resolve the current version of each program in scope
///
/// Programs without any version are absent from the map.
pub async fn resolve_current_versions(
    pool: &SqlitePool,
    scope: ProgramScope<'_>,
) -> Result<HashMap<i64, ProgramVersion>> {
    let (filter, ids_json) = match scope {
        ProgramScope::Ids(ids) if ids.is_empty() => return Ok(HashMap::new()),
        ProgramScope::Ids(ids) => (
            "WHERE program_id IN (SELECT value FROM json_each(?))",
            Some(ids_to_json(ids)?),
        ),
        ProgramScope::All => ("", None),
    };

    let sql = format!(
        r#"
        SELECT {columns} FROM (
            SELECT pv.*,
                   ROW_NUMBER() OVER (
                       PARTITION BY program_id
                       ORDER BY created_at DESC, id DESC
                   ) AS rn
            FROM program_versions pv
            {filter}
        )
        WHERE rn = 1
        "#,
        columns = ProgramVersion::COLUMNS,
        filter = filter,
    );

    let mut query = sqlx::query(&sql);
    if let Some(ids_json) = ids_json {
        query = query.bind(ids_json);
    }
    let rows = query.fetch_all(pool).await?;

    let mut current = HashMap::with_capacity(rows.len());
    for row in &rows {
        let version = ProgramVersion::from_row(row)?;
        current.insert(version.program_id, version);
    }

    debug!("Resolved {} current program versions", current.len());
    Ok(current)
}

/// Current version of one program, archived or not
pub async fn current_program_version(pool: &SqlitePool, program_id: i64) -> Result<ProgramVersion> {
    resolve_current_versions(pool, ProgramScope::Ids(&[program_id]))
        .await?
        .remove(&program_id)
        .ok_or_else(|| Error::NotFound(format!("program {}", program_id)))
}

pub async fn get_program(pool: &SqlitePool, program_id: i64) -> Result<Program> {
    let row = sqlx::query("SELECT id, title, created_at FROM programs WHERE id = ?")
        .bind(program_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("program {}", program_id)))?;

    Program::from_row(&row)
}

/// All versions of a program, newest first
pub async fn program_history(pool: &SqlitePool, program_id: i64) -> Result<Vec<ProgramVersion>> {
    get_program(pool, program_id).await?;

    let rows = sqlx::query(&format!(
        "SELECT {} FROM program_versions WHERE program_id = ? ORDER BY created_at DESC, id DESC",
        ProgramVersion::COLUMNS
    ))
    .bind(program_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(ProgramVersion::from_row).collect()
}

/// Programs whose current version is not archived, by title
pub async fn list_active_programs(
    pool: &SqlitePool,
    include_subprograms: bool,
) -> Result<Vec<ProgramVersion>> {
    let mut active: Vec<ProgramVersion> = resolve_current_versions(pool, ProgramScope::All)
        .await?
        .into_values()
        .filter(|v| !v.archived && (include_subprograms || !v.is_subprogram))
        .collect();

    active.sort_by(|a, b| {
        a.title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then(a.program_id.cmp(&b.program_id))
    });
    Ok(active)
}

pub async fn program_stats(pool: &SqlitePool) -> Result<ProgramStats> {
    let current = resolve_current_versions(pool, ProgramScope::All).await?;

    let mut stats = ProgramStats::default();
    for version in current.values() {
        stats.total += 1;
        if version.archived {
            stats.archived += 1;
        } else {
            stats.active += 1;
        }
        if version.is_subprogram {
            stats.subprograms += 1;
        }
    }
    Ok(stats)
}

async fn validate_draft(pool: &SqlitePool, program_id: Option<i64>, draft: &ProgramDraft) -> Result<()> {
    if draft.title.trim().is_empty() {
        return Err(Error::invalid("title", "must not be empty"));
    }
    validate_created_by(&draft.created_by)?;

    if !draft.element_ids.is_empty() {
        let known: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM song_versions WHERE id IN (SELECT value FROM json_each(?))",
        )
        .bind(ids_to_json(&draft.element_ids)?)
        .fetch_all(pool)
        .await?;
        let known: HashSet<i64> = known.into_iter().collect();
        let unknown: Vec<i64> = draft
            .element_ids
            .iter()
            .copied()
            .filter(|id| !known.contains(id))
            .collect();
        if !unknown.is_empty() {
            return Err(Error::invalid(
                "element_ids",
                format!("unknown song versions {:?}", unknown),
            ));
        }
    }

    if !draft.program_ids.is_empty() {
        let children = resolve_current_versions(pool, ProgramScope::Ids(&draft.program_ids)).await?;
        let unknown: Vec<i64> = draft
            .program_ids
            .iter()
            .copied()
            .filter(|id| !children.contains_key(id))
            .collect();
        if !unknown.is_empty() {
            return Err(Error::invalid(
                "program_ids",
                format!("unknown programs {:?}", unknown),
            ));
        }

        if let Some(program_id) = program_id {
            if reaches(pool, &draft.program_ids, program_id).await? {
                return Err(Error::invalid(
                    "program_ids",
                    format!("program {} would contain itself", program_id),
                ));
            }
        }
    }

    Ok(())
}

/// Whether `target` is reachable from `start` through current versions
async fn reaches(pool: &SqlitePool, start: &[i64], target: i64) -> Result<bool> {
    let mut seen: HashSet<i64> = HashSet::new();
    let mut frontier: Vec<i64> = start.to_vec();

    while !frontier.is_empty() {
        if frontier.contains(&target) {
            return Ok(true);
        }
        frontier.retain(|id| seen.insert(*id));
        let level = resolve_current_versions(pool, ProgramScope::Ids(&frontier)).await?;
        frontier = level
            .values()
            .flat_map(|v| v.program_ids.iter().copied())
            .filter(|id| !seen.contains(id))
            .collect();
    }

    Ok(false)
}

async fn insert_version(pool: &SqlitePool, program_id: i64, draft: &ProgramDraft) -> Result<ProgramVersion> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO program_versions (
            program_id, title, element_ids, program_ids, is_subprogram, archived,
            video_url, print_header, print_footer, created_by, created_at
        ) VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        ProgramVersion::COLUMNS
    ))
    .bind(program_id)
    .bind(draft.title.trim())
    .bind(ids_to_json(&draft.element_ids)?)
    .bind(ids_to_json(&draft.program_ids)?)
    .bind(draft.is_subprogram)
    .bind(&draft.video_url)
    .bind(&draft.print_header)
    .bind(&draft.print_footer)
    .bind(draft.created_by.trim())
    .bind(time::now_db())
    .fetch_one(pool)
    .await?;

    ProgramVersion::from_row(&row)
}

/// Create a program together with its first version
pub async fn create_program(pool: &SqlitePool, draft: ProgramDraft) -> Result<ProgramVersion> {
    validate_draft(pool, None, &draft).await?;

    let program_id: i64 =
        sqlx::query_scalar("INSERT INTO programs (title, created_at) VALUES (?, ?) RETURNING id")
            .bind(draft.title.trim())
            .bind(time::now_db())
            .fetch_one(pool)
            .await?;

    let version = insert_version(pool, program_id, &draft).await?;
    info!("Created program {} '{}' (version {})", program_id, version.title, version.id);
    Ok(version)
}

/// Append a new version; the previous rows are left untouched
///
/// Rejects drafts whose `program_ids` would make the program contain itself.
pub async fn save_program_version(
    pool: &SqlitePool,
    program_id: i64,
    draft: ProgramDraft,
) -> Result<ProgramVersion> {
    get_program(pool, program_id).await?;
    validate_draft(pool, Some(program_id), &draft).await?;

    let version = insert_version(pool, program_id, &draft).await?;

    sqlx::query("UPDATE programs SET title = ? WHERE id = ?")
        .bind(&version.title)
        .bind(program_id)
        .execute(pool)
        .await?;

    info!("Saved program {} version {}", program_id, version.id);
    Ok(version)
}

async fn set_program_archived(pool: &SqlitePool, program_id: i64, archived: bool) -> Result<ProgramVersion> {
    let current = current_program_version(pool, program_id).await?;

    sqlx::query("UPDATE program_versions SET archived = ? WHERE id = ?")
        .bind(archived)
        .bind(current.id)
        .execute(pool)
        .await?;

    info!("Program {} archived={} (version {})", program_id, archived, current.id);
    Ok(ProgramVersion { archived, ..current })
}

/// Archive the program by flagging its current version
pub async fn archive_program(pool: &SqlitePool, program_id: i64) -> Result<ProgramVersion> {
    set_program_archived(pool, program_id, true).await
}

pub async fn restore_program(pool: &SqlitePool, program_id: i64) -> Result<ProgramVersion> {
    set_program_archived(pool, program_id, false).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory;

    fn draft(title: &str) -> ProgramDraft {
        ProgramDraft {
            title: title.to_string(),
            created_by: "director".to_string(),
            ..Default::default()
        }
    }

    /// Insert a version with an explicit timestamp
    async fn insert_at(pool: &SqlitePool, program_id: i64, title: &str, created_at: &str) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO program_versions (program_id, title, created_by, created_at) \
             VALUES (?, ?, 'director', ?) RETURNING id",
        )
        .bind(program_id)
        .bind(title)
        .bind(created_at)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_latest_created_at_wins() {
        let db = init_in_memory().await.unwrap();
        let p = create_program(&db.pool, draft("Sunday")).await.unwrap();

        insert_at(&db.pool, p.program_id, "future", "2999-01-01T00:00:00.000000Z").await;
        insert_at(&db.pool, p.program_id, "past", "2000-01-01T00:00:00.000000Z").await;

        let current = current_program_version(&db.pool, p.program_id).await.unwrap();
        assert_eq!(current.title, "future");
    }

    #[tokio::test]
    async fn test_equal_timestamps_break_ties_by_highest_id() {
        let db = init_in_memory().await.unwrap();
        let p = create_program(&db.pool, draft("Sunday")).await.unwrap();

        let ts = "2999-01-01T00:00:00.000000Z";
        insert_at(&db.pool, p.program_id, "first", ts).await;
        let second = insert_at(&db.pool, p.program_id, "second", ts).await;

        let current = current_program_version(&db.pool, p.program_id).await.unwrap();
        assert_eq!(current.id, second);
    }

    #[tokio::test]
    async fn test_resolve_many_and_missing() {
        let db = init_in_memory().await.unwrap();
        let a = create_program(&db.pool, draft("A")).await.unwrap();
        let b = create_program(&db.pool, draft("B")).await.unwrap();
        let b2 = save_program_version(&db.pool, b.program_id, draft("B edited")).await.unwrap();

        let map = resolve_current_versions(&db.pool, ProgramScope::Ids(&[a.program_id, b.program_id, 999]))
            .await
            .unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map[&a.program_id].id, a.id);
        assert_eq!(map[&b.program_id].id, b2.id);
        assert!(resolve_current_versions(&db.pool, ProgramScope::Ids(&[])).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_appends_history() {
        let db = init_in_memory().await.unwrap();
        let v1 = create_program(&db.pool, draft("Sunday")).await.unwrap();
        let v2 = save_program_version(&db.pool, v1.program_id, draft("Sunday (revised)")).await.unwrap();

        let history = program_history(&db.pool, v1.program_id).await.unwrap();
        assert_eq!(history.iter().map(|v| v.id).collect::<Vec<_>>(), vec![v2.id, v1.id]);
        assert_eq!(history[1].title, "Sunday");

        let program = get_program(&db.pool, v1.program_id).await.unwrap();
        assert_eq!(program.title, "Sunday (revised)");
    }

    #[tokio::test]
    async fn test_archived_program_hidden_but_resolvable() {
        let db = init_in_memory().await.unwrap();
        let a = create_program(&db.pool, draft("A")).await.unwrap();
        let mut sub = draft("B");
        sub.is_subprogram = true;
        let b = create_program(&db.pool, sub).await.unwrap();

        archive_program(&db.pool, a.program_id).await.unwrap();

        let active = list_active_programs(&db.pool, true).await.unwrap();
        assert_eq!(active.iter().map(|v| v.program_id).collect::<Vec<_>>(), vec![b.program_id]);
        assert!(list_active_programs(&db.pool, false).await.unwrap().is_empty());

        let direct = current_program_version(&db.pool, a.program_id).await.unwrap();
        assert!(direct.archived);

        let stats = program_stats(&db.pool).await.unwrap();
        assert_eq!(stats, ProgramStats { total: 2, active: 1, archived: 1, subprograms: 1 });

        restore_program(&db.pool, a.program_id).await.unwrap();
        assert_eq!(list_active_programs(&db.pool, true).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_new_version_unarchives_program() {
        let db = init_in_memory().await.unwrap();
        let a = create_program(&db.pool, draft("A")).await.unwrap();
        archive_program(&db.pool, a.program_id).await.unwrap();

        save_program_version(&db.pool, a.program_id, draft("A again")).await.unwrap();

        assert_eq!(list_active_programs(&db.pool, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_cycles_at_write_time() {
        let db = init_in_memory().await.unwrap();
        let a = create_program(&db.pool, draft("A")).await.unwrap();
        let mut b_draft = draft("B");
        b_draft.program_ids = vec![a.program_id];
        let b = create_program(&db.pool, b_draft).await.unwrap();

        let mut self_ref = draft("A");
        self_ref.program_ids = vec![a.program_id];
        let err = save_program_version(&db.pool, a.program_id, self_ref).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let mut indirect = draft("A");
        indirect.program_ids = vec![b.program_id];
        let err = save_program_version(&db.pool, a.program_id, indirect).await.unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.contains("contain itself")));
    }

    #[tokio::test]
    async fn test_rejects_unknown_references() {
        let db = init_in_memory().await.unwrap();

        let mut bad_elements = draft("A");
        bad_elements.element_ids = vec![404];
        assert!(matches!(
            create_program(&db.pool, bad_elements).await,
            Err(Error::Validation(ref m)) if m.contains("element_ids")
        ));

        let mut bad_children = draft("A");
        bad_children.program_ids = vec![404];
        assert!(matches!(
            create_program(&db.pool, bad_children).await,
            Err(Error::Validation(ref m)) if m.contains("program_ids")
        ));
    }

    #[tokio::test]
    async fn test_unknown_program_is_not_found() {
        let db = init_in_memory().await.unwrap();
        assert!(matches!(current_program_version(&db.pool, 5).await, Err(Error::NotFound(_))));
        assert!(matches!(archive_program(&db.pool, 5).await, Err(Error::NotFound(_))));
        assert!(matches!(
            save_program_version(&db.pool, 5, draft("x")).await,
            Err(Error::NotFound(_))
        ));
    }
}
