use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{open_store, HomeLayout, SubscriptionDb, WatchConfig};

/// Convenience wrapper bundling layout, config, db path, and an open store.
#[derive(Debug)]
pub struct WatchContext {
    pub layout: HomeLayout,
    pub config: WatchConfig,
    pub db_path: PathBuf,
    pub db: SubscriptionDb,
}

impl WatchContext {
    /// Load the watcher config and open the store for a given home root.
    pub fn from_root(root: impl AsRef<Path>) -> Result<Self> {
        let layout = HomeLayout::new(root);
        let (config, db_path, db) = open_store(&layout)?;
        Ok(Self { layout, config, db_path, db })
    }
}
