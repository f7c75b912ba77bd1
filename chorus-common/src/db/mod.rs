//! Database initialization, migrations and row models

pub mod init;
pub mod migrations;
pub mod models;

pub use init::*;
pub use migrations::SchemaInfo;
pub use models::*;

use sqlx::SqlitePool;

/// Open database handle plus the schema information resolved at startup
///
/// `schema` is read once when the database is opened and never re-read.
#[derive(Debug, Clone)]
pub struct Database {
    pub pool: SqlitePool,
    pub schema: SchemaInfo,
}

/// Encode an id list as the JSON text stored in array columns
pub(crate) fn ids_to_json(ids: &[i64]) -> crate::Result<String> {
    Ok(serde_json::to_string(ids)?)
}
