//! Feedback aggregation
//!
//! Votes and comments are recorded against one song version, but a program
//! pins specific version ids while the community keeps editing. Feedback is
//! therefore carried forward by label: a pinned version collects the
//! feedback of every non-archived version of the same song with the same
//! label (its "matching set"). Renaming a label starts a fresh matching set.
//!
//! Aggregation runs in four batch queries regardless of how many versions
//! are pinned: pinned lookup, candidate lookup, votes, comments.

use crate::composition::ProgramGraph;
use crate::db::{ids_to_json, Comment, ProgramVersion, PublicVote, Vote, VoteCategory, VoteType, VoteWeight};
use crate::ports::AdminGate;
use crate::time;
use crate::versions::{get_version_content, get_version_summaries, VersionSummary};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

/// Input for `upsert_vote`
#[derive(Debug, Clone, Deserialize)]
pub struct NewVote {
    pub version_id: i64,
    pub user_id: String,
    pub weight: VoteWeight,
    #[serde(rename = "type")]
    pub vote_type: VoteType,
    pub category: VoteCategory,
}

fn validate_user(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(Error::invalid("user_id", "must not be empty"));
    }
    Ok(())
}

// ========================================
// Votes
// ========================================

/// Insert or replace the caller's vote for (version, category)
///
/// Conflict target is the unique (version_id, user_id, category) index, so
/// concurrent identical upserts converge on one row, last write winning.
pub async fn upsert_vote(pool: &SqlitePool, vote: NewVote) -> Result<Vote> {
    validate_user(&vote.user_id)?;
    let version = get_version_content(pool, vote.version_id).await?;

    let row = sqlx::query(&format!(
        r#"
        INSERT INTO votes (version_id, song_id, user_id, weight, vote_type, category, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(version_id, user_id, category) DO UPDATE SET
            weight = excluded.weight,
            vote_type = excluded.vote_type
        RETURNING {}
        "#,
        Vote::COLUMNS
    ))
    .bind(version.id)
    .bind(version.song_id)
    .bind(vote.user_id.trim())
    .bind(vote.weight.value())
    .bind(vote.vote_type.as_str())
    .bind(vote.category.as_str())
    .bind(time::now_db())
    .fetch_one(pool)
    .await?;

    let stored = Vote::from_row(&row)?;
    debug!(
        "Vote {} on version {} ({}) weight {}",
        stored.id,
        stored.version_id,
        stored.category,
        stored.weight.value()
    );
    Ok(stored)
}

pub async fn delete_vote(
    pool: &SqlitePool,
    version_id: i64,
    user_id: &str,
    category: VoteCategory,
) -> Result<()> {
    let result = sqlx::query("DELETE FROM votes WHERE version_id = ? AND user_id = ? AND category = ?")
        .bind(version_id)
        .bind(user_id)
        .bind(category.as_str())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!(
            "{} vote by {} on version {}",
            category, user_id, version_id
        )));
    }
    Ok(())
}

/// The caller's own votes on one exact version, archived or not
pub async fn user_votes_for_version(pool: &SqlitePool, version_id: i64, user_id: &str) -> Result<Vec<Vote>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM votes WHERE version_id = ? AND user_id = ? ORDER BY category",
        Vote::COLUMNS
    ))
    .bind(version_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(Vote::from_row).collect()
}

// ========================================
// Comments
// ========================================

fn validate_comment(content: &str) -> Result<&str> {
    let content = content.trim();
    if content.is_empty() {
        return Err(Error::invalid("content", "must not be empty"));
    }
    Ok(content)
}

pub async fn add_comment(pool: &SqlitePool, version_id: i64, user_id: &str, content: &str) -> Result<Comment> {
    validate_user(user_id)?;
    let content = validate_comment(content)?;
    get_version_content(pool, version_id).await?;

    let row = sqlx::query(&format!(
        "INSERT INTO comments (version_id, user_id, content, created_at) VALUES (?, ?, ?, ?) RETURNING {}",
        Comment::COLUMNS
    ))
    .bind(version_id)
    .bind(user_id.trim())
    .bind(content)
    .bind(time::now_db())
    .fetch_one(pool)
    .await?;

    Comment::from_row(&row)
}

async fn owned_comment(pool: &SqlitePool, comment_id: i64, user_id: &str) -> Result<Comment> {
    let row = sqlx::query(&format!("SELECT {} FROM comments WHERE id = ?", Comment::COLUMNS))
        .bind(comment_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("comment {}", comment_id)))?;

    let comment = Comment::from_row(&row)?;
    if comment.user_id != user_id {
        return Err(Error::Forbidden(format!("comment {} belongs to another user", comment_id)));
    }
    Ok(comment)
}

/// Owner-only content edit
pub async fn update_comment(pool: &SqlitePool, comment_id: i64, user_id: &str, content: &str) -> Result<Comment> {
    let content = validate_comment(content)?;
    let comment = owned_comment(pool, comment_id, user_id).await?;

    sqlx::query("UPDATE comments SET content = ? WHERE id = ?")
        .bind(content)
        .bind(comment_id)
        .execute(pool)
        .await?;

    Ok(Comment {
        content: content.to_string(),
        ..comment
    })
}

/// Owner-only delete
pub async fn delete_comment(pool: &SqlitePool, comment_id: i64, user_id: &str) -> Result<()> {
    owned_comment(pool, comment_id, user_id).await?;

    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(comment_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// The caller's own comments on one exact version, archived or not
pub async fn user_comments_for_version(
    pool: &SqlitePool,
    version_id: i64,
    user_id: &str,
) -> Result<Vec<Comment>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM comments WHERE version_id = ? AND user_id = ? ORDER BY created_at, id",
        Comment::COLUMNS
    ))
    .bind(version_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(Comment::from_row).collect()
}

// ========================================
// Label-based aggregation
// ========================================

/// For each pinned id, the non-archived same-song same-label version ids
///
/// Unknown pinned ids map to an empty set.
pub async fn matching_sets(pool: &SqlitePool, pinned: &[i64]) -> Result<BTreeMap<i64, Vec<i64>>> {
    let mut sets: BTreeMap<i64, Vec<i64>> = pinned.iter().map(|id| (*id, Vec::new())).collect();
    if pinned.is_empty() {
        return Ok(sets);
    }

    // Step 1: pinned id -> (song, label)
    let rows = sqlx::query(
        "SELECT id, song_id, label FROM song_versions WHERE id IN (SELECT value FROM json_each(?))",
    )
    .bind(ids_to_json(pinned)?)
    .fetch_all(pool)
    .await?;

    let mut keys: HashMap<i64, (i64, String)> = HashMap::with_capacity(rows.len());
    for row in &rows {
        keys.insert(row.try_get("id")?, (row.try_get("song_id")?, row.try_get("label")?));
    }
    if keys.is_empty() {
        return Ok(sets);
    }

    // Step 2: every live version of the touched songs, kept if its label was pinned
    let wanted: HashSet<&(i64, String)> = keys.values().collect();
    let song_ids: Vec<i64> = keys
        .values()
        .map(|(song, _)| *song)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let rows = sqlx::query(
        r#"
        SELECT id, song_id, label FROM song_versions
        WHERE archived = 0 AND song_id IN (SELECT value FROM json_each(?))
        ORDER BY id
        "#,
    )
    .bind(ids_to_json(&song_ids)?)
    .fetch_all(pool)
    .await?;

    let mut by_key: HashMap<(i64, String), Vec<i64>> = HashMap::new();
    for row in &rows {
        let key: (i64, String) = (row.try_get("song_id")?, row.try_get("label")?);
        if wanted.contains(&key) {
            by_key.entry(key).or_default().push(row.try_get("id")?);
        }
    }

    for (pinned_id, key) in &keys {
        if let Some(ids) = by_key.get(key) {
            sets.insert(*pinned_id, ids.clone());
        }
    }
    Ok(sets)
}

/// Votes and comments grouped for one pinned version
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VersionFeedback {
    pub votes: Vec<Vote>,
    pub comments: Vec<Comment>,
}

/// Feedback for each pinned id, carried forward across its matching set
pub async fn collect_feedback(pool: &SqlitePool, pinned: &[i64]) -> Result<BTreeMap<i64, VersionFeedback>> {
    let sets = matching_sets(pool, pinned).await?;

    let union: Vec<i64> = sets
        .values()
        .flatten()
        .copied()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let (votes, comments) = if union.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        // Step 3: one batch per table
        let ids_json = ids_to_json(&union)?;
        let vote_rows = sqlx::query(&format!(
            "SELECT {} FROM votes WHERE version_id IN (SELECT value FROM json_each(?)) ORDER BY created_at, id",
            Vote::COLUMNS
        ))
        .bind(&ids_json)
        .fetch_all(pool)
        .await?;
        let comment_rows = sqlx::query(&format!(
            "SELECT {} FROM comments WHERE version_id IN (SELECT value FROM json_each(?)) ORDER BY created_at, id",
            Comment::COLUMNS
        ))
        .bind(&ids_json)
        .fetch_all(pool)
        .await?;

        (
            vote_rows.iter().map(Vote::from_row).collect::<Result<Vec<_>>>()?,
            comment_rows.iter().map(Comment::from_row).collect::<Result<Vec<_>>>()?,
        )
    };

    debug!(
        "Aggregated {} votes and {} comments over {} versions for {} pinned",
        votes.len(),
        comments.len(),
        union.len(),
        pinned.len()
    );

    // Step 4: regroup by matching-set membership
    let grouped = sets
        .into_iter()
        .map(|(pinned_id, ids)| {
            let members: HashSet<i64> = ids.into_iter().collect();
            let feedback = VersionFeedback {
                votes: votes
                    .iter()
                    .filter(|v| members.contains(&v.version_id))
                    .cloned()
                    .collect(),
                comments: comments
                    .iter()
                    .filter(|c| members.contains(&c.version_id))
                    .cloned()
                    .collect(),
            };
            (pinned_id, feedback)
        })
        .collect();

    Ok(grouped)
}

/// Per-category vote totals
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategorySummary {
    pub total: i64,
    pub count: usize,
    pub has_voted: bool,
    /// Viewer's most recent vote in this category
    pub current_user_vote: Option<VoteWeight>,
}

/// Vote totals for one pinned version
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VoteSummary {
    pub version_id: i64,
    pub total: i64,
    pub count: usize,
    pub has_voted: bool,
    pub categories: BTreeMap<VoteCategory, CategorySummary>,
}

/// Sum weights; viewer fields are only set when a viewer is given
pub fn summarize_votes(version_id: i64, votes: &[Vote], viewer: Option<&str>) -> VoteSummary {
    let mut summary = VoteSummary {
        version_id,
        ..Default::default()
    };

    // Chronological order makes the last viewer vote seen the current one
    let mut ordered: Vec<&Vote> = votes.iter().collect();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    for vote in ordered {
        let weight = vote.weight.value();
        summary.total += weight;
        summary.count += 1;

        let category = summary.categories.entry(vote.category).or_default();
        category.total += weight;
        category.count += 1;

        if viewer == Some(vote.user_id.as_str()) {
            summary.has_voted = true;
            category.has_voted = true;
            category.current_user_vote = Some(vote.weight);
        }
    }

    summary
}

// ========================================
// Program results
// ========================================

/// Results view of a program: versions plus carried-forward feedback
#[derive(Debug, Clone, Serialize)]
pub struct ProgramResults {
    pub program: ProgramVersion,
    pub sub_programs: Vec<ProgramVersion>,
    pub versions: Vec<VersionSummary>,
    /// Public votes; voter ids are never included
    pub votes: BTreeMap<i64, Vec<PublicVote>>,
    pub comments: BTreeMap<i64, Vec<Comment>>,
    pub summaries: BTreeMap<i64, VoteSummary>,
}

/// Distinct ids in first-appearance order
fn distinct_in_order(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

pub async fn resolve_program_results(
    pool: &SqlitePool,
    program_id: i64,
    viewer: Option<&str>,
) -> Result<ProgramResults> {
    let graph = ProgramGraph::load(pool, program_id).await?;
    let pinned = distinct_in_order(&graph.version_ids());

    let mut summaries_by_id = get_version_summaries(pool, &pinned).await?;
    let versions: Vec<VersionSummary> = pinned
        .iter()
        .filter_map(|id| summaries_by_id.remove(id))
        .collect();

    let feedback = collect_feedback(pool, &pinned).await?;

    let mut votes = BTreeMap::new();
    let mut comments = BTreeMap::new();
    let mut summaries = BTreeMap::new();
    for (version_id, group) in feedback {
        summaries.insert(version_id, summarize_votes(version_id, &group.votes, viewer));
        votes.insert(version_id, group.votes.iter().map(Vote::to_public).collect());
        comments.insert(version_id, group.comments);
    }

    Ok(ProgramResults {
        program: graph.root().clone(),
        sub_programs: graph.sub_programs().into_iter().cloned().collect(),
        versions,
        votes,
        comments,
        summaries,
    })
}

/// Admin view: one user's feedback across a program
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserFeedback {
    pub user_id: String,
    pub votes: Vec<Vote>,
    pub comments: Vec<Comment>,
}

/// Feedback over a program grouped by user, voter ids included
///
/// Each underlying vote/comment row appears once per user even when it is
/// carried forward to several pinned versions.
pub async fn feedback_by_user(
    pool: &SqlitePool,
    gate: &dyn AdminGate,
    requester: &str,
    program_id: i64,
) -> Result<Vec<UserFeedback>> {
    gate.require_admin(requester)?;
    info!("Admin {} reading feedback for program {}", requester, program_id);

    let graph = ProgramGraph::load(pool, program_id).await?;
    let pinned = distinct_in_order(&graph.version_ids());
    let feedback = collect_feedback(pool, &pinned).await?;

    let mut seen_votes = HashSet::new();
    let mut seen_comments = HashSet::new();
    let mut by_user: BTreeMap<String, UserFeedback> = BTreeMap::new();

    for group in feedback.into_values() {
        for vote in group.votes {
            if seen_votes.insert(vote.id) {
                by_user
                    .entry(vote.user_id.clone())
                    .or_insert_with(|| UserFeedback {
                        user_id: vote.user_id.clone(),
                        ..Default::default()
                    })
                    .votes
                    .push(vote);
            }
        }
        for comment in group.comments {
            if seen_comments.insert(comment.id) {
                by_user
                    .entry(comment.user_id.clone())
                    .or_insert_with(|| UserFeedback {
                        user_id: comment.user_id.clone(),
                        ..Default::default()
                    })
                    .comments
                    .push(comment);
            }
        }
    }

    Ok(by_user.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory;
    use crate::programs::{create_program, ProgramDraft};
    use crate::render::ChordProRenderer;
    use crate::versions::{archive_version, create_song, create_version, NewSong, NewSongVersion};

    struct Admins(Vec<&'static str>);

    impl AdminGate for Admins {
        fn require_admin(&self, user_id: &str) -> Result<()> {
            if self.0.contains(&user_id) {
                Ok(())
            } else {
                Err(Error::Forbidden(format!("{} is not an admin", user_id)))
            }
        }
    }

    async fn song(pool: &SqlitePool, title: &str) -> i64 {
        create_song(
            pool,
            NewSong {
                title: title.to_string(),
                tags: vec![],
                created_by: "alice".to_string(),
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn version(pool: &SqlitePool, song_id: i64, label: &str) -> i64 {
        create_version(
            pool,
            &ChordProRenderer,
            NewSongVersion {
                song_id,
                label: label.to_string(),
                content: Some(format!("{} part", label)),
                created_by: "alice".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .id
    }

    fn vote(version_id: i64, user: &str, weight: i64, category: VoteCategory) -> NewVote {
        NewVote {
            version_id,
            user_id: user.to_string(),
            weight: VoteWeight::try_from(weight).unwrap(),
            vote_type: VoteType::Content,
            category,
        }
    }

    #[tokio::test]
    async fn test_votes_carry_forward_across_same_label() {
        let db = init_in_memory().await.unwrap();
        let s = song(&db.pool, "S").await;
        let v1 = version(&db.pool, s, "lead").await;
        let v2 = version(&db.pool, s, "lead").await;

        upsert_vote(&db.pool, vote(v1, "ann", 3, VoteCategory::Quality)).await.unwrap();
        upsert_vote(&db.pool, vote(v2, "bob", 1, VoteCategory::Quality)).await.unwrap();

        for pinned in [v1, v2] {
            let feedback = collect_feedback(&db.pool, &[pinned]).await.unwrap();
            let ids: HashSet<i64> = feedback[&pinned].votes.iter().map(|v| v.version_id).collect();
            assert_eq!(ids, HashSet::from([v1, v2]));
            assert_eq!(summarize_votes(pinned, &feedback[&pinned].votes, None).total, 4);
        }
    }

    #[tokio::test]
    async fn test_other_labels_and_songs_do_not_match() {
        let db = init_in_memory().await.unwrap();
        let s = song(&db.pool, "S").await;
        let t = song(&db.pool, "T").await;
        let lead = version(&db.pool, s, "lead").await;
        let harmony = version(&db.pool, s, "harmony").await;
        let other_lead = version(&db.pool, t, "lead").await;

        let sets = matching_sets(&db.pool, &[lead, 404]).await.unwrap();
        assert_eq!(sets[&lead], vec![lead]);
        assert!(sets[&404].is_empty());

        upsert_vote(&db.pool, vote(harmony, "ann", 3, VoteCategory::Quality)).await.unwrap();
        upsert_vote(&db.pool, vote(other_lead, "ann", 3, VoteCategory::Quality)).await.unwrap();

        let feedback = collect_feedback(&db.pool, &[lead]).await.unwrap();
        assert!(feedback[&lead].votes.is_empty());
    }

    #[tokio::test]
    async fn test_archived_versions_leave_matching_but_own_rows_remain() {
        let db = init_in_memory().await.unwrap();
        let s = song(&db.pool, "S").await;
        let v1 = version(&db.pool, s, "lead").await;
        let v2 = version(&db.pool, s, "lead").await;

        upsert_vote(&db.pool, vote(v1, "ann", -3, VoteCategory::Quality)).await.unwrap();
        add_comment(&db.pool, v1, "ann", "too high").await.unwrap();
        archive_version(&db.pool, v1).await.unwrap();

        let feedback = collect_feedback(&db.pool, &[v2]).await.unwrap();
        assert!(feedback[&v2].votes.is_empty());
        assert!(feedback[&v2].comments.is_empty());

        assert_eq!(user_votes_for_version(&db.pool, v1, "ann").await.unwrap().len(), 1);
        assert_eq!(user_comments_for_version(&db.pool, v1, "ann").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let db = init_in_memory().await.unwrap();
        let s = song(&db.pool, "S").await;
        let v = version(&db.pool, s, "lead").await;

        let first = upsert_vote(&db.pool, vote(v, "ann", 3, VoteCategory::Quality)).await.unwrap();
        let second = upsert_vote(&db.pool, vote(v, "ann", 3, VoteCategory::Quality)).await.unwrap();
        assert_eq!(first.id, second.id);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let feedback = collect_feedback(&db.pool, &[v]).await.unwrap();
        assert_eq!(summarize_votes(v, &feedback[&v].votes, None).total, 3);
    }

    #[tokio::test]
    async fn test_upsert_replaces_weight_per_category() {
        let db = init_in_memory().await.unwrap();
        let s = song(&db.pool, "S").await;
        let v = version(&db.pool, s, "lead").await;

        upsert_vote(&db.pool, vote(v, "ann", 3, VoteCategory::Quality)).await.unwrap();
        upsert_vote(&db.pool, vote(v, "ann", -1, VoteCategory::Quality)).await.unwrap();
        upsert_vote(&db.pool, vote(v, "ann", 1, VoteCategory::Singability)).await.unwrap();

        let mine = user_votes_for_version(&db.pool, v, "ann").await.unwrap();
        assert_eq!(mine.len(), 2);

        let feedback = collect_feedback(&db.pool, &[v]).await.unwrap();
        let summary = summarize_votes(v, &feedback[&v].votes, Some("ann"));
        assert_eq!(summary.total, 0);
        assert!(summary.has_voted);
        let quality = &summary.categories[&VoteCategory::Quality];
        assert_eq!(quality.current_user_vote.map(|w| w.value()), Some(-1));

        delete_vote(&db.pool, v, "ann", VoteCategory::Quality).await.unwrap();
        assert!(matches!(
            delete_vote(&db.pool, v, "ann", VoteCategory::Quality).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_vote_on_unknown_version_is_not_found() {
        let db = init_in_memory().await.unwrap();
        assert!(matches!(
            upsert_vote(&db.pool, vote(77, "ann", 1, VoteCategory::Quality)).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_summary_without_viewer() {
        let db = init_in_memory().await.unwrap();
        let s = song(&db.pool, "S").await;
        let v = version(&db.pool, s, "lead").await;
        upsert_vote(&db.pool, vote(v, "ann", 3, VoteCategory::Quality)).await.unwrap();

        let feedback = collect_feedback(&db.pool, &[v]).await.unwrap();
        let anonymous = summarize_votes(v, &feedback[&v].votes, None);
        assert!(!anonymous.has_voted);
        assert!(anonymous.categories[&VoteCategory::Quality].current_user_vote.is_none());

        let other = summarize_votes(v, &feedback[&v].votes, Some("bob"));
        assert!(!other.has_voted);
    }

    #[tokio::test]
    async fn test_comment_ownership() {
        let db = init_in_memory().await.unwrap();
        let s = song(&db.pool, "S").await;
        let v = version(&db.pool, s, "lead").await;

        let c = add_comment(&db.pool, v, "ann", "  nice  ").await.unwrap();
        assert_eq!(c.content, "nice");

        assert!(matches!(
            update_comment(&db.pool, c.id, "bob", "mine now").await,
            Err(Error::Forbidden(_))
        ));
        let edited = update_comment(&db.pool, c.id, "ann", "very nice").await.unwrap();
        assert_eq!(edited.content, "very nice");

        assert!(matches!(delete_comment(&db.pool, c.id, "bob").await, Err(Error::Forbidden(_))));
        delete_comment(&db.pool, c.id, "ann").await.unwrap();
        assert!(matches!(delete_comment(&db.pool, c.id, "ann").await, Err(Error::NotFound(_))));

        assert!(matches!(add_comment(&db.pool, v, "ann", "   ").await, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_program_results_and_admin_view() {
        let db = init_in_memory().await.unwrap();
        let s = song(&db.pool, "S").await;
        let v7 = version(&db.pool, s, "lead").await;
        let v7b = version(&db.pool, s, "lead").await;
        let v9 = version(&db.pool, s, "bass").await;

        let q = create_program(
            &db.pool,
            ProgramDraft {
                title: "Q".to_string(),
                element_ids: vec![v9],
                is_subprogram: true,
                created_by: "director".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let p = create_program(
            &db.pool,
            ProgramDraft {
                title: "P".to_string(),
                element_ids: vec![v7],
                program_ids: vec![q.program_id],
                created_by: "director".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        upsert_vote(&db.pool, vote(v7b, "ann", 3, VoteCategory::Quality)).await.unwrap();
        add_comment(&db.pool, v9, "bob", "solid").await.unwrap();

        let results = resolve_program_results(&db.pool, p.program_id, Some("ann")).await.unwrap();
        assert_eq!(results.versions.iter().map(|v| v.id).collect::<Vec<_>>(), vec![v7, v9]);
        assert_eq!(results.sub_programs.len(), 1);
        assert_eq!(results.votes[&v7].len(), 1);
        assert!(results.summaries[&v7].has_voted);
        assert_eq!(results.comments[&v9][0].content, "solid");

        let json = serde_json::to_value(&results).unwrap();
        assert!(json["votes"][v7.to_string()][0].get("user_id").is_none());

        let gate = Admins(vec!["root"]);
        assert!(matches!(
            feedback_by_user(&db.pool, &gate, "ann", p.program_id).await,
            Err(Error::Forbidden(_))
        ));
        let by_user = feedback_by_user(&db.pool, &gate, "root", p.program_id).await.unwrap();
        assert_eq!(by_user.iter().map(|u| u.user_id.as_str()).collect::<Vec<_>>(), vec!["ann", "bob"]);
        assert_eq!(by_user[0].votes[0].user_id, "ann");
    }
}
