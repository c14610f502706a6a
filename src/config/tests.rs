use std::io::Write;

use serial_test::serial;
use tempfile::NamedTempFile;

use super::*;
use crate::error::CatalogError;

fn yaml_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn clear_env() {
    std::env::remove_var(CONFIG_ENV_VAR);
    std::env::remove_var("VELLUM__NUM_VERSIONS");
    std::env::remove_var("VELLUM__PRELOAD");
}

#[test]
fn test_defaults() {
    let config = CatalogConfig::for_test();
    assert_eq!(config.num_versions, 1);
    assert!(config.preload);
}

#[test]
#[serial]
fn test_load_without_sources_uses_defaults() {
    clear_env();
    let config = CatalogConfig::load(None).unwrap();
    assert_eq!(config, CatalogConfig::default());
}

#[test]
#[serial]
fn test_load_from_path() {
    clear_env();
    let file = yaml_file("num_versions: 4\npreload: false\n");

    let config = CatalogConfig::load(file.path().to_str()).unwrap();

    assert_eq!(config.num_versions, 4);
    assert!(!config.preload);
}

#[test]
#[serial]
fn test_partial_file_keeps_other_defaults() {
    clear_env();
    let file = yaml_file("num_versions: 3\n");

    let config = CatalogConfig::load(file.path().to_str()).unwrap();

    assert_eq!(config.num_versions, 3);
    assert!(config.preload);
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    let file = yaml_file("num_versions: 3\n");
    std::env::set_var(CONFIG_ENV_VAR, file.path());
    std::env::set_var("VELLUM__NUM_VERSIONS", "7");

    let config = CatalogConfig::load(None);
    clear_env();

    assert_eq!(config.unwrap().num_versions, 7);
}

#[test]
#[serial]
fn test_missing_required_file_is_config_error() {
    clear_env();

    let err = CatalogConfig::load(Some("/nonexistent/vellum.yaml")).unwrap_err();

    assert!(matches!(err, CatalogError::Config(_)));
}

#[test]
fn test_builders() {
    let config = CatalogConfig::for_test()
        .with_num_versions(5)
        .with_preload(false);
    assert_eq!(config.num_versions, 5);
    assert!(!config.preload);
}
