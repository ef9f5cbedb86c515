//! Configuration loading
//!
//! JSON file first, then environment overrides. `.env` files are honoured
//! through dotenvy so local runs don't need exported variables.

use super::types::Config;
use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration: file (if present) + environment overrides
pub fn load(path: Option<&Path>) -> Result<Config> {
    dotenvy::dotenv().ok();

    let mut config = match path {
        Some(p) if p.exists() => {
            let raw = std::fs::read_to_string(p)
                .with_context(|| format!("Failed to read config file {}", p.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse config file {}", p.display()))?
        }
        Some(p) => {
            tracing::warn!(path = %p.display(), "Config file not found, using defaults");
            Config::default()
        }
        None => Config::default(),
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(path) = std::env::var("RACEFEED_DATABASE_PATH") {
        config.database_path = Some(path.into());
    }
    if let Ok(url) = std::env::var("RACEFEED_WEBHOOK_URL") {
        config.notifier_webhook_url = Some(url);
    }
    if let Ok(key) = std::env::var("RACEFEED_ADMIN_KEY") {
        config.admin_key = Some(key);
    }
    if let Ok(enabled) = std::env::var("RACEFEED_MONITOR_ENABLED") {
        config.monitor_enabled = enabled != "0" && !enabled.eq_ignore_ascii_case("false");
    }
}
