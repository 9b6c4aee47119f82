//! Host configuration (`config.yaml` in the data directory).
//!
//! This is how the host process runs, not what the user scheduled: how often
//! the daemon polls for due timers and which executor produces the effect.
//! User-facing preferences live in [`crate::settings`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::paths;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ExecutorKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    /// Open URLs with the desktop's default handler.
    #[default]
    Desktop,
    /// Only log what would have been opened. For headless machines.
    Log,
}

// ---------------------------------------------------------------------------
// HostConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Daemon poll interval for due timers, in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default)]
    pub executor: ExecutorKind,
    /// Program to open URLs with instead of the system default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launcher: Option<String>,
}

fn default_tick_ms() -> u64 {
    1000
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            executor: ExecutorKind::default(),
            launcher: None,
        }
    }
}

impl HostConfig {
    /// Load from `data_dir`; a missing file means defaults.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = paths::config_path(data_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: HostConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let path = paths::config_path(data_dir);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.tick_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "tick_ms must be greater than 0".to_string(),
            });
        } else if self.tick_ms > 60_000 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "tick_ms={} means actions may open up to {}s late",
                    self.tick_ms,
                    self.tick_ms / 1000
                ),
            });
        }

        match (&self.launcher, self.executor) {
            (Some(launcher), _) if launcher.trim().is_empty() => {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: "launcher is empty; the system default will be used".to_string(),
                });
            }
            (Some(launcher), ExecutorKind::Log) => {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("launcher '{launcher}' is ignored by the log executor"),
                });
            }
            _ => {}
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        assert_eq!(HostConfig::load(dir.path()).unwrap(), HostConfig::default());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cfg = HostConfig {
            tick_ms: 250,
            executor: ExecutorKind::Log,
            launcher: None,
        };
        cfg.save(dir.path()).unwrap();
        assert_eq!(HostConfig::load(dir.path()).unwrap(), cfg);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg: HostConfig = serde_yaml::from_str("launcher: firefox\n").unwrap();
        assert_eq!(cfg.tick_ms, 1000);
        assert_eq!(cfg.executor, ExecutorKind::Desktop);
        assert_eq!(cfg.launcher.as_deref(), Some("firefox"));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(paths::config_path(dir.path()), "tick_ms: [fast]").unwrap();
        assert!(HostConfig::load(dir.path()).is_err());
    }

    #[test]
    fn default_config_validates_clean() {
        assert!(HostConfig::default().validate().is_empty());
    }

    #[test]
    fn validate_flags_zero_tick() {
        let cfg = HostConfig {
            tick_ms: 0,
            ..HostConfig::default()
        };
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Error);
    }

    #[test]
    fn validate_flags_ignored_launcher() {
        let cfg = HostConfig {
            executor: ExecutorKind::Log,
            launcher: Some("firefox".into()),
            ..HostConfig::default()
        };
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.message.contains("ignored by the log executor")));
    }
}
