use super::*;

#[test]
fn default_config_is_valid() {
    assert!(validate(&TabhostConfig::default()).is_ok());
}

#[test]
fn tick_out_of_range() {
    let mut config = TabhostConfig::default();
    config.bridge.tick_ms = 2;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("bridge.tick_ms = 2"));
}

#[test]
fn shutdown_timeout_bounds() {
    let mut config = TabhostConfig::default();
    config.shutdown.timeout_ms = 100;
    assert!(validate(&config).is_ok());
    config.shutdown.timeout_ms = 60_001;
    assert!(validate(&config).is_err());
}

#[test]
fn empty_home_url_rejected() {
    let mut config = TabhostConfig::default();
    config.views.home_url = "  ".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("views.home_url must not be empty"));
}

#[test]
fn nan_default_size_rejected() {
    let mut config = TabhostConfig::default();
    config.views.default_width = f64::NAN;
    assert!(validate(&config).is_err());
}

#[test]
fn blocked_domain_with_path_rejected() {
    let mut config = TabhostConfig::default();
    config.security.blocked_domains = vec!["ads.example.com/banner".into()];
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("security.blocked_domains[0]"));
}

#[test]
fn multiple_errors_are_collected() {
    let mut config = TabhostConfig::default();
    config.bridge.tick_ms = 0;
    config.prefetch.max_entries = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("bridge.tick_ms"));
    assert!(err.contains("prefetch.max_entries"));
    assert!(err.contains("; "));
}
