//! Database schema migrations
//!
//! Versioned migrations tracked in the `schema_version` table. Each
//! migration is idempotent (checks before altering) so it is safe to run
//! against databases that already have the change.
//!
//! # Migration Guidelines
//!
//! 1. Never modify existing migrations
//! 2. Add a new `migrate_vN` for each schema change and bump `SchemaInfo::CODE_VERSION`
//! 3. Prefer ALTER TABLE over DROP/CREATE to preserve data

use crate::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Schema version resolved once at startup
///
/// Consumers receive this value explicitly instead of probing table shape
/// at request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchemaInfo {
    pub version: i32,
}

impl SchemaInfo {
    /// Schema version this build writes
    ///
    /// **IMPORTANT:** Increment this when adding new migrations
    pub const CODE_VERSION: i32 = 3;

    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        Ok(Self {
            version: get_schema_version(pool).await?,
        })
    }

    pub fn is_current(&self) -> bool {
        self.version == Self::CODE_VERSION
    }

    /// Database was written by a newer build
    pub fn is_newer_than_code(&self) -> bool {
        self.version > Self::CODE_VERSION
    }
}

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

async fn has_column(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?",
    )
    .bind(table)
    .bind(column)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == SchemaInfo::CODE_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > SchemaInfo::CODE_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version,
            SchemaInfo::CODE_VERSION
        );
        warn!("This may indicate a downgrade. Proceeding with caution.");
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version,
        SchemaInfo::CODE_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    if current_version < 3 {
        migrate_v3(pool).await?;
        set_schema_version(pool, 3).await?;
        info!("✓ Migration v3 completed");
    }

    info!("All migrations completed successfully");
    Ok(())
}

/// Migration v1: baseline
///
/// Tables are created by `CREATE TABLE IF NOT EXISTS`; v1 only records
/// that the baseline exists.
async fn migrate_v1(_pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: baseline schema");
    Ok(())
}

/// Migration v2: cached rendering column on song_versions
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: Add rendered_content to song_versions");

    if !has_column(pool, "song_versions", "rendered_content").await? {
        sqlx::query("ALTER TABLE song_versions ADD COLUMN rendered_content TEXT")
            .execute(pool)
            .await?;
        info!("Migration v2: Added rendered_content column");
    }

    Ok(())
}

/// Migration v3: vote categories
///
/// Votes used to be unique per (version, user). Each user now gets one vote
/// per category; existing votes become `quality` votes.
async fn migrate_v3(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v3: vote categories");

    if !has_column(pool, "votes", "category").await? {
        sqlx::query("ALTER TABLE votes ADD COLUMN category TEXT NOT NULL DEFAULT 'quality'")
            .execute(pool)
            .await?;
        info!("Migration v3: Added category column to votes");
    }

    sqlx::query("DROP INDEX IF EXISTS idx_votes_version_user")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_votes_version_user_category \
         ON votes(version_id, user_id, category)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
