//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`CHORUS_ROOT`)
//! 3. TOML config file (`root_folder` key)
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable config file never aborts startup; it is logged
//! and defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_ENV_VAR: &str = "CHORUS_ROOT";

/// Default HTTP bind address
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5780";

/// Default page size for changelog listings
pub const DEFAULT_CHANGELOG_PAGE_SIZE: i64 = 50;

/// Database file name inside the root folder
const DATABASE_FILE: &str = "chorus.db";

/// Media directory name inside the root folder
const MEDIA_DIR: &str = "media";

/// Contents of `config.toml`
///
/// Every field is optional so partial files are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub dev_mode: Option<bool>,
    pub admin_users: Vec<String>,
    pub changelog_page_size: Option<i64>,
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load the platform config file, falling back to defaults
    pub fn load_or_default() -> Self {
        let Some(path) = config_file_path() else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match Self::load(&path) {
            Ok(config) => {
                info!("Loaded config file: {}", path.display());
                config
            }
            Err(e) => {
                warn!("Ignoring unreadable config file: {}", e);
                Self::default()
            }
        }
    }
}

/// Locate the config file for the platform
///
/// On Linux `~/.config/chorus/config.toml` is preferred over
/// `/etc/chorus/config.toml`.
pub fn config_file_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("chorus").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/chorus/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("chorus"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/chorus"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("chorus"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/chorus"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("chorus"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\chorus"))
    } else {
        PathBuf::from("./chorus_data")
    }
}

/// Resolves the root folder from CLI, environment, config file and defaults
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    file_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, file: &TomlConfig) -> Self {
        Self {
            cli_arg,
            file_value: file.root_folder.clone(),
        }
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_ENV_VAR) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.file_value {
            return path.clone();
        }

        default_root_folder()
    }
}

/// Creates the root folder layout and names the files inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root folder and media directory if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.media_path())?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn media_path(&self) -> PathBuf {
        self.root.join(MEDIA_DIR)
    }
}

/// Values supplied on the command line (or their `env` fallbacks)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub dev_mode: Option<bool>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub bind_address: String,
    /// Include full error detail in 500 responses
    pub dev_mode: bool,
    pub admin_users: Vec<String>,
    pub changelog_page_size: i64,
}

impl ServiceConfig {
    /// Merge CLI overrides over file values over defaults
    pub fn resolve(overrides: ConfigOverrides, file: TomlConfig) -> Result<Self> {
        let root_folder = RootFolderResolver::new(overrides.root_folder, &file).resolve();

        let changelog_page_size = file
            .changelog_page_size
            .unwrap_or(DEFAULT_CHANGELOG_PAGE_SIZE);
        if changelog_page_size <= 0 {
            return Err(Error::Config(format!(
                "changelog_page_size must be positive, got {}",
                changelog_page_size
            )));
        }

        Ok(Self {
            root_folder,
            bind_address: overrides
                .bind_address
                .or(file.bind_address)
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            dev_mode: overrides.dev_mode.or(file.dev_mode).unwrap_or(false),
            admin_users: file.admin_users,
            changelog_page_size,
        })
    }
}
