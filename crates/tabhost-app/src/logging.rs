//! Subscriber setup. Logs go to stderr; stdout carries the IPC stream.

use tabhost_config::schema::LogLevel;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::EnvFilter;

/// `--log-level` wins over the configured level.
pub fn resolve_directive(cli_level: Option<&str>, configured: LogLevel) -> String {
    cli_level
        .map(str::trim)
        .filter(|level| !level.is_empty())
        .unwrap_or(configured.as_directive())
        .to_string()
}

pub fn init(directive: &str) {
    let directive: Directive = directive.parse().unwrap_or_else(|e| {
        eprintln!("invalid log level {directive:?} ({e}); using info");
        LevelFilter::INFO.into()
    });
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_level_overrides_config() {
        assert_eq!(resolve_directive(Some("debug"), LogLevel::Warn), "debug");
        assert_eq!(
            resolve_directive(Some("tabhost_webview=trace"), LogLevel::Info),
            "tabhost_webview=trace"
        );
    }

    #[test]
    fn config_level_is_the_fallback() {
        assert_eq!(resolve_directive(None, LogLevel::Warn), "warn");
        assert_eq!(resolve_directive(Some("  "), LogLevel::Error), "error");
    }
}
