//! State push configuration.

use serde::{Deserialize, Serialize};

/// Event bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Dispatcher tick in milliseconds; coalesced patches flush once per tick
    /// (valid range: 4-1000).
    pub tick_ms: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { tick_ms: 16 }
    }
}
