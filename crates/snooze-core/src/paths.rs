use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

/// Default data directory name, under the home directory.
pub const DATA_DIR: &str = ".snooze";

pub const DB_FILE: &str = "snooze.redb";
pub const CONFIG_FILE: &str = "config.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DB_FILE)
}

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// `snooze-actions-<timestamp>.json`, safe to use as a file name.
pub fn export_file_name(at: DateTime<Utc>) -> String {
    format!("snooze-actions-{}.json", at.format("%Y-%m-%dT%H-%M-%S"))
}
