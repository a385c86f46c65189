//! Navigation security configuration.

use serde::{Deserialize, Serialize};

/// Ad and tracker hosts blocked when `block_trackers` is on.
pub const BUILT_IN_TRACKERS: &[&str] = &[
    "doubleclick.net",
    "googlesyndication.com",
    "googleadservices.com",
    "google-analytics.com",
    "adservice.google.com",
    "scorecardresearch.com",
    "adnxs.com",
    "taboola.com",
    "outbrain.com",
    "criteo.com",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Extra blocked hosts; subdomains are blocked too.
    pub blocked_domains: Vec<String>,
    /// Include [`BUILT_IN_TRACKERS`].
    pub block_trackers: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            blocked_domains: Vec::new(),
            block_trackers: true,
        }
    }
}

impl SecurityConfig {
    /// Lowercased, de-duplicated blocklist with leading dots stripped.
    pub fn effective_blocklist(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let configured = self.blocked_domains.iter().map(String::as_str);
        let built_in = self
            .block_trackers
            .then_some(BUILT_IN_TRACKERS)
            .unwrap_or_default()
            .iter()
            .copied();
        for domain in configured.chain(built_in) {
            let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
            if !domain.is_empty() && !out.contains(&domain) {
                out.push(domain);
            }
        }
        out
    }
}
