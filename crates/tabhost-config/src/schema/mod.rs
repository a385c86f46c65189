//! Configuration schema types for tabhost.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod bridge;
mod prefetch;
mod security;
mod system;
mod views;

pub use bridge::*;
pub use prefetch::*;
pub use security::*;
pub use system::*;
pub use views::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for tabhost.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct TabhostConfig {
    pub views: ViewsConfig,
    pub bridge: BridgeConfig,
    pub security: SecurityConfig,
    pub prefetch: PrefetchConfig,
    pub shutdown: ShutdownConfig,
    pub logging: LoggingConfig,
}
