use std::fs;

use anyhow::{Context, Result};
use sentinel_core::db::{HomeLayout, SubscriptionDb, WatchConfig};

use crate::canonicalize_or_current;

/// Initialize a watcher home at `home`.
pub fn init_command(
    home: &str,
    base_url: Option<String>,
    cycle_seconds: Option<u64>,
) -> Result<()> {
    let home_path = canonicalize_or_current(home)?;
    let layout = HomeLayout::new(&home_path);

    // Ensure directories exist.
    fs::create_dir_all(&layout.meta_dir)
        .with_context(|| format!("Failed to create meta dir: {}", layout.meta_dir.display()))?;
    fs::create_dir_all(&layout.reports_dir).with_context(|| {
        format!("Failed to create reports dir: {}", layout.reports_dir.display())
    })?;

    // Build the watcher config.
    let mut config = WatchConfig::new(layout.db_path_relative_string());
    if let Some(base_url) = base_url {
        config.base_url = base_url;
    }
    if let Some(cycle_seconds) = cycle_seconds {
        config.cycle_seconds = cycle_seconds;
    }

    // Serialize and write config JSON.
    let json = serde_json::to_string_pretty(&config)?;
    fs::write(&layout.config_path, json)
        .with_context(|| format!("Failed to write config: {}", layout.config_path.display()))?;

    // Create the database immediately so follow-on commands (and tests)
    // can rely on its presence.
    SubscriptionDb::open(&layout.db_path).with_context(|| {
        format!(
            "Failed to initialize subscription database at {}",
            layout.db_path.display()
        )
    })?;

    println!("Initialized watcher home:");
    println!("  Root: {}", layout.root.display());
    println!("  Config: {}", layout.config_path.display());
    println!("  DB path (relative): {}", config.db.path);
    println!("  Reports dir: {}", layout.reports_dir.display());
    println!("  Portal: {}", config.base_url);
    println!("  Cycle: every {}s", config.cycle_seconds);

    Ok(())
}
