//! Tests for configuration loading and root folder resolution
//!
//! Priority order: CLI argument, CHORUS_ROOT, config file, platform default.
//!
//! Note: Uses serial_test to prevent environment variable races.
//! Tests that touch CHORUS_ROOT are marked #[serial].

use chorus_common::config::{
    default_root_folder, ConfigOverrides, RootFolderInitializer, RootFolderResolver, ServiceConfig,
    TomlConfig, DEFAULT_BIND_ADDRESS, DEFAULT_CHANGELOG_PAGE_SIZE, ROOT_ENV_VAR,
};
use chorus_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_ENV_VAR);

    let resolver = RootFolderResolver::new(None, &TomlConfig::default());
    assert_eq!(resolver.resolve(), default_root_folder());
}

#[test]
#[serial]
fn test_resolver_env_var() {
    env::set_var(ROOT_ENV_VAR, "/tmp/chorus-test-env-root");

    let resolver = RootFolderResolver::new(None, &TomlConfig::default());
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/chorus-test-env-root"));

    env::remove_var(ROOT_ENV_VAR);
}

#[test]
#[serial]
fn test_resolver_cli_beats_env_beats_file() {
    let file = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/chorus-from-file")),
        ..Default::default()
    };

    env::remove_var(ROOT_ENV_VAR);
    assert_eq!(
        RootFolderResolver::new(None, &file).resolve(),
        PathBuf::from("/tmp/chorus-from-file")
    );

    env::set_var(ROOT_ENV_VAR, "/tmp/chorus-from-env");
    assert_eq!(
        RootFolderResolver::new(None, &file).resolve(),
        PathBuf::from("/tmp/chorus-from-env")
    );

    let cli = Some(PathBuf::from("/tmp/chorus-from-cli"));
    assert_eq!(
        RootFolderResolver::new(cli, &file).resolve(),
        PathBuf::from("/tmp/chorus-from-cli")
    );

    env::remove_var(ROOT_ENV_VAR);
}

#[test]
#[serial]
fn test_blank_env_var_is_ignored() {
    env::set_var(ROOT_ENV_VAR, "   ");

    let resolver = RootFolderResolver::new(None, &TomlConfig::default());
    assert_eq!(resolver.resolve(), default_root_folder());

    env::remove_var(ROOT_ENV_VAR);
}

#[test]
fn test_initializer_creates_directories_idempotently() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("nested").join("chorus");
    let initializer = RootFolderInitializer::new(root.clone());

    initializer.ensure_directory_exists().unwrap();
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert!(initializer.media_path().is_dir());
    assert_eq!(initializer.database_path(), root.join("chorus.db"));
}

#[test]
fn test_toml_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/chorus"
bind_address = "0.0.0.0:8080"
admin_users = ["director", "root"]
changelog_page_size = 25
"#,
    )
    .unwrap();

    let config = TomlConfig::load(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/chorus")));
    assert_eq!(config.bind_address.as_deref(), Some("0.0.0.0:8080"));
    assert_eq!(config.admin_users, vec!["director".to_string(), "root".to_string()]);
    assert_eq!(config.changelog_page_size, Some(25));
    assert_eq!(config.dev_mode, None);
}

#[test]
fn test_malformed_toml_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "bind_address = [not toml").unwrap();

    assert!(matches!(TomlConfig::load(&path), Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_service_config_defaults() {
    env::remove_var(ROOT_ENV_VAR);

    let config = ServiceConfig::resolve(ConfigOverrides::default(), TomlConfig::default()).unwrap();
    assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
    assert_eq!(config.changelog_page_size, DEFAULT_CHANGELOG_PAGE_SIZE);
    assert!(!config.dev_mode);
    assert!(config.admin_users.is_empty());
}

#[test]
#[serial]
fn test_service_config_overrides_win() {
    env::remove_var(ROOT_ENV_VAR);

    let file = TomlConfig {
        bind_address: Some("10.0.0.1:9000".to_string()),
        dev_mode: Some(false),
        ..Default::default()
    };
    let overrides = ConfigOverrides {
        root_folder: Some(PathBuf::from("/tmp/chorus-cli")),
        bind_address: Some("127.0.0.1:6000".to_string()),
        dev_mode: Some(true),
    };

    let config = ServiceConfig::resolve(overrides, file).unwrap();
    assert_eq!(config.root_folder, PathBuf::from("/tmp/chorus-cli"));
    assert_eq!(config.bind_address, "127.0.0.1:6000");
    assert!(config.dev_mode);
}

#[test]
#[serial]
fn test_service_config_rejects_non_positive_page_size() {
    env::remove_var(ROOT_ENV_VAR);

    let file = TomlConfig {
        changelog_page_size: Some(0),
        ..Default::default()
    };
    assert!(matches!(
        ServiceConfig::resolve(ConfigOverrides::default(), file),
        Err(Error::Config(_))
    ));
}
