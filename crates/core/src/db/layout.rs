use std::path::{Path, PathBuf};

/// Logical layout of a watcher home directory.
///
/// This is derived from a chosen root path. It does *not* perform any IO
/// itself; the CLI or other frontends create directories and files based on
/// this layout.
#[derive(Debug, Clone)]
pub struct HomeLayout {
    /// Root directory of the watcher home.
    pub root: PathBuf,
    /// Directory for internal metadata (.sentinel).
    pub meta_dir: PathBuf,
    /// Path to the watcher config file (JSON).
    pub config_path: PathBuf,
    /// Path to the subscription database file.
    pub db_path: PathBuf,
    /// Directory where unrecognized portal pages are dumped for diagnosis.
    pub reports_dir: PathBuf,
}

impl HomeLayout {
    /// Compute the default layout for a watcher home rooted at `root`.
    ///
    /// This does *not* touch the filesystem.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let meta_dir = root.join(".sentinel");
        let config_path = meta_dir.join("config.json");
        let db_path = meta_dir.join("subscriptions.db");
        let reports_dir = root.join("reports");

        Self {
            root,
            meta_dir,
            config_path,
            db_path,
            reports_dir,
        }
    }

    /// Compute a database path string suitable for storing in
    /// `WatchConfig`, typically as a path relative to `root`.
    pub fn db_path_relative_string(&self) -> String {
        match self.db_path.strip_prefix(&self.root) {
            Ok(rel) => rel.to_string_lossy().to_string(),
            Err(_) => self.db_path.to_string_lossy().to_string(),
        }
    }
}
