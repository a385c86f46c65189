//! Tests for TOML config loading, creation, and path resolution.

use super::*;
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_tabhost_config.toml"));
    let err = result.unwrap_err();
    assert!(matches!(err, tabhost_common::ConfigError::FileNotFound(_)));
}

#[test]
fn load_or_create_writes_template_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tabhost").join("config.toml");

    let first = load_or_create(&path).unwrap();
    assert!(path.exists());
    assert_eq!(first.views.home_url, "about:blank");

    std::fs::write(&path, "[views]\nhome_url = \"https://home.example\"\n").unwrap();
    let second = load_or_create(&path).unwrap();
    assert_eq!(second.views.home_url, "https://home.example");
}

#[test]
fn load_or_create_keeps_parse_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[views\n").unwrap();

    let err = load_or_create(&path).unwrap_err();
    assert!(matches!(err, tabhost_common::ConfigError::ParseError(_)));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "[views\n");
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[views]
home_url = "https://home.example"

[prefetch]
max_entries = 2
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.views.home_url, "https://home.example");
    assert_eq!(config.prefetch.max_entries, 2);
    // Defaults preserved
    assert!(config.prefetch.enabled);
    assert_eq!(config.bridge.tick_ms, 16);
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, tabhost_common::ConfigError::ParseError(_)));
}

#[test]
fn out_of_range_values_are_kept_with_warning() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[bridge]\ntick_ms = 0\n").unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.bridge.tick_ms, 0);
}

#[test]
fn create_and_load_default_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tabhost").join("config.toml");

    create_default_config(&path).unwrap();
    assert!(path.exists());

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.views.home_url, "about:blank");
    assert_eq!(config.shutdown.timeout_ms, 5000);
}

#[test]
fn default_template_passes_validation() {
    let config: crate::TabhostConfig = toml::from_str(super::template::default_config_toml()).unwrap();
    assert!(crate::validation::validate(&config).is_ok());
}

#[test]
fn default_config_path_ends_with_tabhost_config() {
    if let Ok(path) = default_config_path() {
        assert!(path.ends_with("tabhost/config.toml"));
    }
}
