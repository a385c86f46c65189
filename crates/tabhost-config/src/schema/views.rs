//! View surface configuration types.

use serde::{Deserialize, Serialize};

/// Defaults applied to every hosted view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewsConfig {
    /// URL loaded into tabs created without one.
    pub home_url: String,
    /// Custom user agent string.
    pub user_agent: Option<String>,
    /// Prefix of the per-view storage partition name.
    pub partition_prefix: String,
    /// Whether to enable dev tools (always on in debug builds).
    pub devtools: bool,
    /// Size used for off-screen surfaces (prefetch).
    pub default_width: f64,
    pub default_height: f64,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            home_url: "about:blank".to_string(),
            user_agent: None,
            partition_prefix: "persist:view-".to_string(),
            devtools: cfg!(debug_assertions),
            default_width: 1024.0,
            default_height: 768.0,
        }
    }
}
