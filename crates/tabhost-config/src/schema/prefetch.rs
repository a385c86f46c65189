//! Prefetch configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    pub enabled: bool,
    /// Hidden surfaces kept alive at once (valid range: 1-16).
    pub max_entries: u32,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 4,
        }
    }
}
