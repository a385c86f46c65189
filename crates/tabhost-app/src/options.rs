//! Config -> runtime settings.

use std::time::Duration;

use tabhost_config::TabhostConfig;
use tabhost_webview::HostOptions;

pub fn host_options(config: &TabhostConfig) -> HostOptions {
    HostOptions {
        home_url: config.views.home_url.clone(),
        partition_prefix: config.views.partition_prefix.clone(),
        user_agent: config.views.user_agent.clone(),
        devtools: config.views.devtools,
        prefetch_enabled: config.prefetch.enabled,
        prefetch_max_entries: config.prefetch.max_entries as usize,
        offscreen_width: config.views.default_width,
        offscreen_height: config.views.default_height,
        blocked_domains: config.security.effective_blocklist(),
    }
}

/// How often queued state patches are flushed.
pub fn tick_interval(config: &TabhostConfig) -> Duration {
    Duration::from_millis(u64::from(config.bridge.tick_ms.max(1)))
}

pub fn shutdown_timeout(config: &TabhostConfig) -> Duration {
    Duration::from_millis(u64::from(config.shutdown.timeout_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_over() {
        let config = TabhostConfig::default();
        let options = host_options(&config);
        assert_eq!(options.home_url, config.views.home_url);
        assert_eq!(options.partition_prefix, config.views.partition_prefix);
        assert_eq!(options.prefetch_max_entries, config.prefetch.max_entries as usize);
        assert_eq!(shutdown_timeout(&config), Duration::from_millis(5000));
    }

    #[test]
    fn blocklist_includes_configured_domains() {
        let mut config = TabhostConfig::default();
        config.security.blocked_domains = vec!["ads.example".into()];
        let options = host_options(&config);
        assert!(options.blocked_domains.iter().any(|d| d == "ads.example"));
    }

    #[test]
    fn tick_never_zero() {
        let mut config = TabhostConfig::default();
        config.bridge.tick_ms = 0;
        assert_eq!(tick_interval(&config), Duration::from_millis(1));
    }
}
