//! tabhost configuration system.
//!
//! TOML-based configuration with validation. All sections use sensible
//! defaults so partial configs work out of the box.

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{TabhostConfig, CONFIG_SCHEMA_VERSION};

use std::path::Path;

use tabhost_common::ConfigError;

/// Load config from `path` if given, otherwise from the platform default
/// path (created on first run). An explicit path is never created.
pub fn load_config(path: Option<&Path>) -> Result<TabhostConfig, ConfigError> {
    match path {
        Some(path) => toml_loader::load_from_path(path),
        None => toml_loader::load_default(),
    }
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &TabhostConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
