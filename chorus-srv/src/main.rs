//! chorus-srv - HTTP service for versioned songs, programs and feedback
//!
//! Startup: tracing, config (CLI over env over file over defaults), root
//! folder layout, database with migrations, then the axum server.

use anyhow::{Context, Result};
use chorus_common::config::{ConfigOverrides, RootFolderInitializer, ServiceConfig, TomlConfig};
use chorus_common::db::init_database;
use chorus_common::SchemaInfo;
use chorus_srv::{build_router, AppState};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "chorus-srv", version, about = "Versioned songs, programs and feedback")]
struct Args {
    /// Root folder holding chorus.db and media/
    #[arg(long, env = "CHORUS_ROOT")]
    root_folder: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:5780
    #[arg(long, env = "CHORUS_BIND")]
    bind: Option<String>,

    /// Include full error text in 500 responses
    #[arg(long, env = "CHORUS_DEV_MODE")]
    dev_mode: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting Chorus service (chorus-srv) v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let overrides = ConfigOverrides {
        root_folder: args.root_folder,
        bind_address: args.bind,
        dev_mode: args.dev_mode.then_some(true),
    };
    let config = ServiceConfig::resolve(overrides, TomlConfig::load_or_default())?;

    let initializer = RootFolderInitializer::new(config.root_folder.clone());
    initializer
        .ensure_directory_exists()
        .with_context(|| format!("creating root folder {}", initializer.root().display()))?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());

    let database = match init_database(&db_path).await {
        Ok(database) => {
            info!("✓ Database ready (schema v{})", database.schema.version);
            database
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    if database.schema.is_newer_than_code() {
        warn!(
            "Database schema v{} is newer than this build (v{})",
            database.schema.version,
            SchemaInfo::CODE_VERSION
        );
    }
    if config.dev_mode {
        warn!("Dev mode enabled: internal error details are returned to clients");
    }
    if config.admin_users.is_empty() {
        info!("No admin users configured; admin endpoints will refuse every caller");
    }

    let bind_address = config.bind_address.clone();
    let state = AppState::new(database, config, initializer.media_path());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding {}", bind_address))?;
    info!("chorus-srv listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
