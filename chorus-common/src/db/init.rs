//! Database initialization
//!
//! Startup sequence:
//! 1. Open (or create) the SQLite file with WAL and foreign keys enabled
//! 2. CREATE TABLE IF NOT EXISTS for every table (idempotent)
//! 3. Versioned migrations for databases created by older builds
//! 4. Resolve `SchemaInfo` once; callers keep it for the process lifetime

use crate::db::migrations::{run_migrations, SchemaInfo};
use crate::db::Database;
use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Busy timeout applied to every connection (milliseconds)
const BUSY_TIMEOUT_MS: i64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<Database> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    prepare(pool).await
}

/// Single-connection in-memory database
///
/// Used by tests and tooling; the connection is never recycled so the
/// in-memory contents live as long as the pool.
pub async fn init_in_memory() -> Result<Database> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    prepare(pool).await
}

async fn prepare(pool: SqlitePool) -> Result<Database> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    sqlx::query(&format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS))
        .execute(&pool)
        .await?;

    create_schema_version_table(&pool).await?;
    create_songs_table(&pool).await?;
    create_song_versions_table(&pool).await?;
    create_programs_table(&pool).await?;
    create_program_versions_table(&pool).await?;
    create_votes_table(&pool).await?;
    create_comments_table(&pool).await?;

    run_migrations(&pool).await?;

    let schema = SchemaInfo::load(&pool).await?;
    info!(
        "Database schema v{} (code expects v{})",
        schema.version,
        SchemaInfo::CODE_VERSION
    );

    Ok(Database { pool, schema })
}

pub(crate) async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_songs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS songs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            archived INTEGER NOT NULL DEFAULT 0,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Song versions are append-only; only `archived` is ever updated
async fn create_song_versions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS song_versions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            song_id INTEGER NOT NULL REFERENCES songs(id),
            label TEXT NOT NULL,
            content TEXT,
            rendered_content TEXT,
            audio_url TEXT,
            bpm INTEGER,
            previous_version_id INTEGER REFERENCES song_versions(id),
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            archived INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Label matching looks up (song_id, label) pairs
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_song_versions_song_label ON song_versions(song_id, label)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_programs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS programs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Program versions are append-only; the newest row per program is current
async fn create_program_versions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS program_versions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            program_id INTEGER NOT NULL REFERENCES programs(id),
            title TEXT NOT NULL,
            element_ids TEXT NOT NULL DEFAULT '[]',
            program_ids TEXT NOT NULL DEFAULT '[]',
            is_subprogram INTEGER NOT NULL DEFAULT 0,
            archived INTEGER NOT NULL DEFAULT 0,
            video_url TEXT,
            print_header TEXT,
            print_footer TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_program_versions_current \
         ON program_versions(program_id, created_at DESC, id DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_votes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS votes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            version_id INTEGER NOT NULL REFERENCES song_versions(id),
            song_id INTEGER NOT NULL REFERENCES songs(id),
            user_id TEXT NOT NULL,
            weight INTEGER NOT NULL,
            vote_type TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT 'quality',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_comments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            version_id INTEGER NOT NULL REFERENCES song_versions(id),
            user_id TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_version ON comments(version_id)")
        .execute(pool)
        .await?;

    Ok(())
}
