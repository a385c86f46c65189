use std::path::PathBuf;

use clap::Parser;

/// tabhost: a host for tabbed, embedded web views driven over stdio.
#[derive(Parser, Debug)]
#[command(name = "tabhost", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error or a filter directive).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print the effective config as JSON and exit.
    #[arg(long)]
    pub print_config: bool,

    /// Run without a window even when built with native webviews.
    #[arg(long)]
    pub headless: bool,

    /// Root directory for per-view browsing data. Defaults to the platform
    /// data dir; views are incognito if none can be determined.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_empty() {
        let args = Args::parse_from(["tabhost"]);
        assert!(args.config.is_none());
        assert!(args.log_level.is_none());
        assert!(!args.print_config);
        assert!(!args.headless);
    }

    #[test]
    fn overrides_are_parsed() {
        let args = Args::parse_from([
            "tabhost",
            "--config",
            "/tmp/tabhost.toml",
            "--log-level",
            "debug",
            "--headless",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/tabhost.toml")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.headless);
    }
}
