//! chorus-srv library - HTTP service for songs, programs and feedback
//!
//! Exposes the core operations of `chorus-common` over JSON, plus locally
//! stored media under `/media`.

use axum::Router;
use chorus_common::config::ServiceConfig;
use chorus_common::ports::{AdminGate, BlobStore};
use chorus_common::render::ContentRenderer;
use chorus_common::{Database, SchemaInfo};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

pub mod adapters;
pub mod api;
pub mod error;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Schema version resolved when the database was opened
    pub schema: SchemaInfo,
    pub config: Arc<ServiceConfig>,
    pub renderer: Arc<dyn ContentRenderer>,
    pub admin: Arc<dyn AdminGate>,
    pub blobs: Arc<dyn BlobStore>,
    /// Directory served at `/media`
    pub media_dir: PathBuf,
}

impl AppState {
    /// Wire the default adapters: ChordPro rendering, config admin list and
    /// the local content-addressed media store
    pub fn new(database: Database, config: ServiceConfig, media_dir: PathBuf) -> Self {
        Self {
            db: database.pool,
            schema: database.schema,
            admin: Arc::new(adapters::StaticAdminList::new(config.admin_users.clone())),
            blobs: Arc::new(adapters::LocalBlobStore::new(media_dir.clone())),
            renderer: Arc::new(chorus_common::render::ChordProRenderer),
            config: Arc::new(config),
            media_dir,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

    let media = ServeDir::new(&state.media_dir);

    Router::new()
        .merge(api::health_routes())
        .merge(api::song_routes())
        .merge(api::version_routes())
        .merge(api::program_routes())
        .merge(api::feedback_routes())
        .merge(api::changelog_routes())
        .merge(api::upload_routes())
        .merge(api::admin_routes())
        .nest_service(adapters::MEDIA_URL_PREFIX, media)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            error::expose_error_detail,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
