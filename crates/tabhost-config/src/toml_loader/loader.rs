//! Reading `config.toml`: parse, validate, and create it on first run.

use std::io::ErrorKind;
use std::path::Path;

use crate::schema::TabhostConfig;
use crate::validation;
use tabhost_common::ConfigError;
use tracing::{info, warn};

use super::paths::{create_default_config, default_config_path};

/// Load the config at `path`.
///
/// A missing file is `FileNotFound`; unreadable or malformed files are
/// `ParseError`. Out-of-range values only produce a warning.
pub fn load_from_path(path: &Path) -> Result<TabhostConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConfigError::FileNotFound(path.to_path_buf()),
        _ => ConfigError::ParseError(format!("failed to read {}: {e}", path.display())),
    })?;

    let config: TabhostConfig = toml::from_str(&content).map_err(|e| {
        ConfigError::ParseError(format!("{} is not valid TOML: {e}", path.display()))
    })?;

    if let Err(e) = validation::validate(&config) {
        warn!(path = %path.display(), "config out of range, keeping parsed values: {e}");
    }

    info!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Load `path`, writing the documented template there first if it does not
/// exist yet. A fresh template yields the built-in defaults.
pub fn load_or_create(path: &Path) -> Result<TabhostConfig, ConfigError> {
    match load_from_path(path) {
        Err(ConfigError::FileNotFound(_)) => {
            info!(path = %path.display(), "first run, writing config template");
            create_default_config(path)?;
            Ok(TabhostConfig::default())
        }
        other => other,
    }
}

/// [`load_or_create`] at `<config dir>/tabhost/config.toml`.
pub fn load_default() -> Result<TabhostConfig, ConfigError> {
    load_or_create(&default_config_path()?)
}
