//! Tests for database initialization and schema migrations
//!
//! Covers automatic creation on first run, reopening an existing file and
//! upgrading a database written by an older build.

use chorus_common::db::init::init_database;
use chorus_common::SchemaInfo;
use sqlx::Row;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data").join("chorus.db");

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");

    let db = result.unwrap();
    assert!(db.schema.is_current());
}

#[tokio::test]
async fn test_database_opens_existing_and_keeps_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("chorus.db");

    let first = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO songs (title, created_by, created_at) VALUES ('Grace', 'alice', '2026-01-01T00:00:00.000000Z')")
        .execute(&first.pool)
        .await
        .unwrap();
    first.pool.close().await;

    let second = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM songs")
        .fetch_one(&second.pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(second.schema.version, SchemaInfo::CODE_VERSION);
}

#[tokio::test]
async fn test_vote_uniqueness_is_per_category() {
    let dir = tempfile::tempdir().unwrap();
    let db = init_database(&dir.path().join("chorus.db")).await.unwrap();

    let rows = sqlx::query("SELECT name, \"unique\" FROM pragma_index_list('votes')")
        .fetch_all(&db.pool)
        .await
        .unwrap();

    let unique: Vec<String> = rows
        .iter()
        .filter(|r| r.get::<i64, _>("unique") == 1)
        .map(|r| r.get::<String, _>("name"))
        .collect();
    assert!(unique.contains(&"idx_votes_version_user_category".to_string()));
    assert!(!unique.contains(&"idx_votes_version_user".to_string()));
}

#[tokio::test]
async fn test_upgrade_from_first_schema_version() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("legacy.db");

    // Shape written by the first release: no rendered_content, no vote category
    {
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = sqlx::SqlitePool::connect(&url).await.unwrap();
        for statement in [
            "CREATE TABLE schema_version (version INTEGER PRIMARY KEY, applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP)",
            "INSERT INTO schema_version (version) VALUES (1)",
            "CREATE TABLE songs (id INTEGER PRIMARY KEY AUTOINCREMENT, title TEXT NOT NULL, tags TEXT NOT NULL DEFAULT '[]', archived INTEGER NOT NULL DEFAULT 0, created_by TEXT NOT NULL, created_at TEXT NOT NULL)",
            "CREATE TABLE song_versions (id INTEGER PRIMARY KEY AUTOINCREMENT, song_id INTEGER NOT NULL, label TEXT NOT NULL, content TEXT, audio_url TEXT, bpm INTEGER, previous_version_id INTEGER, created_by TEXT NOT NULL, created_at TEXT NOT NULL, archived INTEGER NOT NULL DEFAULT 0)",
            "CREATE TABLE votes (id INTEGER PRIMARY KEY AUTOINCREMENT, version_id INTEGER NOT NULL, song_id INTEGER NOT NULL, user_id TEXT NOT NULL, weight INTEGER NOT NULL, vote_type TEXT NOT NULL, created_at TEXT NOT NULL)",
            "CREATE UNIQUE INDEX idx_votes_version_user ON votes(version_id, user_id)",
        ] {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
        pool.close().await;
    }

    let db = init_database(&db_path).await.unwrap();
    assert_eq!(db.schema.version, SchemaInfo::CODE_VERSION);

    let has_rendered: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('song_versions') WHERE name = 'rendered_content'",
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(has_rendered, 1);

    let has_category: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('votes') WHERE name = 'category'",
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(has_category, 1);
}
