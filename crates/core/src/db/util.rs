use std::path::PathBuf;

use anyhow::{Context, Result};

use super::{HomeLayout, SubscriptionDb, WatchConfig};

/// Load the watcher config JSON from disk for a given layout.
pub fn load_config(layout: &HomeLayout) -> Result<WatchConfig> {
    let config_json = std::fs::read_to_string(&layout.config_path).with_context(|| {
        format!("Failed to read watcher config at {}", layout.config_path.display())
    })?;
    let config: WatchConfig =
        serde_json::from_str(&config_json).context("Failed to parse watcher config JSON")?;
    Ok(config)
}

/// Resolve the DB path (respecting relative/absolute config) and open the
/// subscription store.
pub fn open_store(layout: &HomeLayout) -> Result<(WatchConfig, PathBuf, SubscriptionDb)> {
    let config = load_config(layout)?;
    let config_db_path = std::path::Path::new(&config.db.path);
    let db_path = if config_db_path.is_absolute() {
        config_db_path.to_path_buf()
    } else {
        layout.root.join(config_db_path)
    };
    let db = SubscriptionDb::open(&db_path).with_context(|| {
        format!("Failed to open subscription database at {}", db_path.display())
    })?;
    Ok((config, db_path, db))
}
