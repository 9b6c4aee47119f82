use serde::{Deserialize, Serialize};

use crate::config::{ConfigWarning, WarnLevel};
use crate::error::Result;
use crate::executor::OpenMode;
use crate::kv::KvStore;
use crate::recurrence::{parse_time, Weekend};

pub const SETTINGS_KEY: &str = "settings";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// User settings snapshot, read once per scheduler task.
///
/// Stored as JSON under [`SETTINGS_KEY`]. Fields missing from storage take
/// their named defaults, so older or partial records load cleanly. Key names
/// from the browser build are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// 0 = Sunday … 6 = Saturday.
    #[serde(default = "default_week_start", alias = "startOfWeek")]
    pub week_start_day: u8,
    /// First day of the two-day weekend.
    #[serde(default = "default_weekend_start", alias = "startOfWeekend")]
    pub weekend_start_day: u8,
    #[serde(default = "default_day_start", alias = "startOfDay")]
    pub day_start: String,
    #[serde(default = "default_day_end", alias = "endOfDay")]
    pub day_end: String,
    #[serde(default, alias = "openInBg")]
    pub execute_in_background: bool,
    #[serde(default = "default_later_hours")]
    pub later_hours: u32,
}

fn default_week_start() -> u8 {
    1
}

fn default_weekend_start() -> u8 {
    6
}

fn default_day_start() -> String {
    "09:00".to_string()
}

fn default_day_end() -> String {
    "18:00".to_string()
}

/// Upper bound for `laterHours`: one year.
pub const MAX_LATER_HOURS: u32 = 24 * 366;

fn default_later_hours() -> u32 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            week_start_day: default_week_start(),
            weekend_start_day: default_weekend_start(),
            day_start: default_day_start(),
            day_end: default_day_end(),
            execute_in_background: false,
            later_hours: default_later_hours(),
        }
    }
}

impl Settings {
    /// Load from `kv`; absent or null means all defaults.
    pub async fn load(kv: &dyn KvStore) -> Result<Self> {
        match kv.get(SETTINGS_KEY).await? {
            Some(v) if !v.is_null() => Ok(serde_json::from_value(v)?),
            _ => Ok(Self::default()),
        }
    }

    pub async fn save(&self, kv: &dyn KvStore) -> Result<()> {
        kv.set(SETTINGS_KEY, serde_json::to_value(self)?).await
    }

    pub fn weekend(&self) -> Weekend {
        Weekend::starting(self.weekend_start_day)
    }

    pub fn open_mode(&self) -> OpenMode {
        OpenMode::from_background_flag(self.execute_in_background)
    }

    /// Set one field by its camelCase name from a string value.
    pub fn set_field(&mut self, key: &str, value: &str) -> std::result::Result<(), String> {
        fn day(value: &str) -> std::result::Result<u8, String> {
            value
                .parse::<u8>()
                .ok()
                .filter(|d| *d <= 6)
                .ok_or_else(|| format!("'{value}' is not a day index 0-6"))
        }
        fn time(value: &str) -> std::result::Result<String, String> {
            parse_time(value)
                .map(|t| t.format("%H:%M").to_string())
                .ok_or_else(|| format!("'{value}' is not a HH:MM time"))
        }
        match key {
            "weekStartDay" => self.week_start_day = day(value)?,
            "weekendStartDay" => self.weekend_start_day = day(value)?,
            "dayStart" => self.day_start = time(value)?,
            "dayEnd" => self.day_end = time(value)?,
            "executeInBackground" => {
                self.execute_in_background = value
                    .parse()
                    .map_err(|_| format!("'{value}' is not true/false"))?
            }
            "laterHours" => {
                let hours: u32 = value
                    .parse()
                    .map_err(|_| format!("'{value}' is not a whole number of hours"))?;
                if hours > MAX_LATER_HOURS {
                    return Err(format!("laterHours {hours} exceeds {MAX_LATER_HOURS}"));
                }
                self.later_hours = hours;
            }
            other => return Err(format!("unknown setting '{other}'")),
        }
        Ok(())
    }

    /// Check the snapshot and return any warnings.
    ///
    /// Checks performed:
    /// 1. Day indices within 0-6.
    /// 2. `dayStart` / `dayEnd` parse as `HH:MM`.
    /// 3. `dayStart` before `dayEnd`.
    /// 4. `laterHours` non-zero and at most [`MAX_LATER_HOURS`].
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for (name, value) in [
            ("weekStartDay", self.week_start_day),
            ("weekendStartDay", self.weekend_start_day),
        ] {
            if value > 6 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{name} is {value}, expected 0 (Sunday) to 6 (Saturday)"),
                });
            }
        }

        let start = parse_time(&self.day_start);
        let end = parse_time(&self.day_end);
        for (name, raw, parsed) in [
            ("dayStart", &self.day_start, start),
            ("dayEnd", &self.day_end, end),
        ] {
            if parsed.is_none() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{name} '{raw}' is not a HH:MM time"),
                });
            }
        }

        if let (Some(s), Some(e)) = (start, end) {
            if s >= e {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "dayStart {} is not before dayEnd {}",
                        self.day_start, self.day_end
                    ),
                });
            }
        }

        if self.later_hours == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "laterHours is 0; the 'later' preset fires immediately".to_string(),
            });
        }
        if self.later_hours > MAX_LATER_HOURS {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "laterHours is {}, expected at most {MAX_LATER_HOURS}",
                    self.later_hours
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
