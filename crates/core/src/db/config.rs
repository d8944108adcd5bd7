use serde::{Deserialize, Serialize};

use crate::portal::DEFAULT_BASE_URL;

/// Database location inside the watcher home.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// Path to the subscription database file (typically relative to the
    /// watcher home).
    pub path: String,
}

impl DbConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Serializable configuration for one watcher deployment.
///
/// This lives at `.sentinel/config.json` under the chosen home directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Portal deployment to drive. Tests and staging point this at a stub.
    pub base_url: String,
    /// Seconds the polling loop sleeps between cycles.
    pub cycle_seconds: u64,
    /// Config format version. This is about the file format, not the binary.
    pub config_version: String,
    /// Database configuration (path is typically relative to the home).
    pub db: DbConfig,
}

impl WatchConfig {
    /// Create a configuration with production defaults and the given db path.
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cycle_seconds: 60,
            config_version: "0.1.0".to_string(),
            db: DbConfig::new(db_path),
        }
    }
}
