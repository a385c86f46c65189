//! Full configuration validation.
//!
//! Validates numeric ranges and URL-ish fields, collecting every problem
//! into a single `ConfigError`.

mod helpers;

#[cfg(test)]
mod tests;

use crate::schema::TabhostConfig;
use tabhost_common::ConfigError;

use helpers::{validate_non_empty, validate_range, validate_range_f64};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &TabhostConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_non_empty(&mut errors, "views.home_url", &config.views.home_url);
    validate_non_empty(
        &mut errors,
        "views.partition_prefix",
        &config.views.partition_prefix,
    );
    validate_range_f64(
        &mut errors,
        "views.default_width",
        config.views.default_width,
        1.0,
        16384.0,
    );
    validate_range_f64(
        &mut errors,
        "views.default_height",
        config.views.default_height,
        1.0,
        16384.0,
    );
    validate_range(&mut errors, "bridge.tick_ms", config.bridge.tick_ms, 4, 1000);
    validate_range(
        &mut errors,
        "prefetch.max_entries",
        config.prefetch.max_entries,
        1,
        16,
    );
    validate_range(
        &mut errors,
        "shutdown.timeout_ms",
        config.shutdown.timeout_ms,
        100,
        60_000,
    );
    for (i, domain) in config.security.blocked_domains.iter().enumerate() {
        if domain.contains('/') || domain.contains(char::is_whitespace) {
            errors.push(format!(
                "security.blocked_domains[{i}] = {domain:?} is not a host name"
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
