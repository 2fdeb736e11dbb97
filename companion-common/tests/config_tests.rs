//! Configuration loading and root folder resolution
//!
//! Tests that touch COMPANION_ROOT_FOLDER are marked #[serial] so they do
//! not race on the process environment.

use companion_common::config::{
    default_root_folder, load_or_default, load_toml_config, RootFolderResolver, StoreBackend,
    TomlConfig, ROOT_FOLDER_ENV,
};
use companion_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_missing_config_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.toml");

    let config = load_or_default(Some(&path)).unwrap();
    assert!(config.root_folder.is_none());
    assert_eq!(config.store.backend, StoreBackend::Sqlite);
}

#[test]
fn test_config_file_is_parsed() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("companion-nlp.toml");
    std::fs::write(
        &path,
        r#"
        root_folder = "/srv/companion"

        [models]
        dir = "/opt/models"

        [store]
        backend = "sqlite"
        "#,
    )
    .unwrap();

    let config = load_or_default(Some(&path)).unwrap();
    assert_eq!(config.models_dir(&PathBuf::from("/ignored")), PathBuf::from("/opt/models"));
    assert_eq!(config.store.backend, StoreBackend::Sqlite);
}

#[test]
fn test_malformed_config_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bad.toml");
    std::fs::write(&path, "[store\nbackend = ").unwrap();

    assert!(matches!(load_toml_config(&path), Err(Error::Config(_))));
    assert!(load_or_default(Some(&path)).is_err());
}

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/companion-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/companion-toml")),
        ..Default::default()
    };

    let resolved = RootFolderResolver::new()
        .with_cli_arg(Some(PathBuf::from("/tmp/companion-cli")))
        .with_toml_config(&config)
        .resolve();

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolved, PathBuf::from("/tmp/companion-cli"));
}

#[test]
#[serial]
fn test_environment_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/companion-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/companion-toml")),
        ..Default::default()
    };

    let resolved = RootFolderResolver::new().with_toml_config(&config).resolve();

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolved, PathBuf::from("/tmp/companion-env"));
}

#[test]
#[serial]
fn test_toml_then_compiled_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/companion-toml")),
        ..Default::default()
    };

    assert_eq!(
        RootFolderResolver::new().with_toml_config(&config).resolve(),
        PathBuf::from("/tmp/companion-toml")
    );
    assert_eq!(RootFolderResolver::new().resolve(), default_root_folder());
}
