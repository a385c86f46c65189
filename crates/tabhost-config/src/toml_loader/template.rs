//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> &'static str {
    r##"# tabhost configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[views]
# home_url = "about:blank"        # loaded into tabs opened without a URL
# user_agent = "tabhost/0.1"
# partition_prefix = "persist:view-"
# devtools = false
# default_width = 1024.0          # size of off-screen prefetch surfaces
# default_height = 768.0

[bridge]
# tick_ms = 16                    # 4-1000, state patches flush once per tick

[security]
# blocked_domains = ["ads.example.com"]
# block_trackers = true           # include the built-in ad/tracker list

[prefetch]
# enabled = true
# max_entries = 4                 # 1-16

[shutdown]
# timeout_ms = 5000               # 100-60000

[logging]
# level = "info"                  # trace, debug, info, warn, error
"##
}
