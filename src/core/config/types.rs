//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Process-wide configuration, read once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file; platform data dir when unset
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Event URLs scraped on a schedule
    #[serde(default)]
    pub targets: Vec<ScrapeTarget>,

    /// Webhook receiving the plain-text notifications
    #[serde(default)]
    pub notifier_webhook_url: Option<String>,

    /// Pre-shared key expected on external trigger calls
    #[serde(default)]
    pub admin_key: Option<String>,

    /// Where ancillary JSON blobs land ("database" or "filesystem")
    #[serde(default = "super::defaults::default_storage_mode")]
    pub storage_mode: String,

    /// Background endpoint monitoring on/off
    #[serde(default = "super::defaults::default_true")]
    pub monitor_enabled: bool,

    /// Scheduler tick driving monitor checks and the retry drain
    #[serde(default = "super::defaults::default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Minimum delay between page requests to one organiser
    #[serde(default = "super::defaults::default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,

    /// Whether scrapers may fall back to the headless renderer
    #[serde(default = "super::defaults::default_true")]
    pub allow_headless: bool,
}

/// One event URL to ingest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeTarget {
    /// Organiser tag hint; empty string means "detect from URL"
    #[serde(default)]
    pub organiser: String,
    pub url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            targets: Vec::new(),
            notifier_webhook_url: None,
            admin_key: None,
            storage_mode: super::defaults::default_storage_mode(),
            monitor_enabled: true,
            tick_interval_secs: super::defaults::default_tick_interval_secs(),
            politeness_delay_ms: super::defaults::default_politeness_delay_ms(),
            allow_headless: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.monitor_enabled);
        assert_eq!(config.tick_interval_secs, 60);
        assert_eq!(config.politeness_delay_ms, 500);
        assert_eq!(config.storage_mode, "database");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"targets": [{"url": "https://evochip.net/race/3"}]}"#,
        )
        .unwrap();
        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.targets[0].organiser, "");
        assert!(config.allow_headless);
    }
}
