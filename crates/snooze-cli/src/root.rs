use std::path::{Path, PathBuf};

use snooze_core::paths::DATA_DIR;

/// Resolve the data directory.
///
/// Priority:
/// 1. `--data-dir` flag / `SNOOZE_HOME` env var (passed in as `explicit`)
/// 2. `~/.snooze`
/// 3. `./.snooze` when no home directory is known
pub fn resolve_data_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    if let Some(home) = home::home_dir() {
        return home.join(DATA_DIR);
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    cwd.join(DATA_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_dir_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_data_dir(Some(dir.path())), dir.path());
    }

    #[test]
    fn default_ends_in_dot_snooze() {
        let resolved = resolve_data_dir(None);
        assert!(resolved.ends_with(DATA_DIR));
    }
}
