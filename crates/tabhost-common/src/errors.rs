use std::path::PathBuf;

use crate::types::{TabId, ViewId};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failure reported by a render surface backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("surface already destroyed")]
    Destroyed,

    #[error("surface not attached to the compositing tree")]
    NotAttached,

    #[error("surface creation failed: {0}")]
    Creation(String),

    #[error("engine error: {0}")]
    Engine(String),
}

/// Errors returned by view and tab commands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    #[error("view not found: {0}")]
    ViewNotFound(ViewId),

    #[error("tab {tab} not found in view {view}")]
    TabNotFound { view: ViewId, tab: TabId },

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("navigation to {host} blocked")]
    Blocked { host: String },

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

#[derive(Debug, thiserror::Error)]
pub enum TabhostError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("ipc error: {0}")]
    Ipc(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("bridge.tick_ms = 0".into());
        assert_eq!(err.to_string(), "config validation error: bridge.tick_ms = 0");
    }

    #[test]
    fn view_error_display() {
        let err = ViewError::ViewNotFound(ViewId::from("w1"));
        assert_eq!(err.to_string(), "view not found: w1");

        let err = ViewError::TabNotFound {
            view: ViewId::from("w1"),
            tab: TabId::from("t9"),
        };
        assert_eq!(err.to_string(), "tab t9 not found in view w1");

        let err = ViewError::Blocked {
            host: "ads.example".into(),
        };
        assert_eq!(err.to_string(), "navigation to ads.example blocked");
    }

    #[test]
    fn view_error_from_surface_is_transparent() {
        let err: ViewError = SurfaceError::Engine("ERR_NAME_NOT_RESOLVED".into()).into();
        assert!(matches!(err, ViewError::Surface(_)));
        assert_eq!(err.to_string(), "engine error: ERR_NAME_NOT_RESOLVED");
    }

    #[test]
    fn tabhost_error_from_config() {
        let config_err = ConfigError::ParseError("bad toml".into());
        let err: TabhostError = config_err.into();
        assert!(matches!(err, TabhostError::Config(_)));
        assert!(err.to_string().contains("bad toml"));
    }

    #[test]
    fn tabhost_error_from_view() {
        let err: TabhostError = ViewError::MalformedInput("empty url".into()).into();
        assert!(matches!(err, TabhostError::View(_)));
        assert_eq!(err.to_string(), "malformed input: empty url");
    }

    #[test]
    fn tabhost_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout closed");
        let err: TabhostError = io_err.into();
        assert!(matches!(err, TabhostError::Io(_)));
        assert!(err.to_string().contains("stdout closed"));
    }
}
