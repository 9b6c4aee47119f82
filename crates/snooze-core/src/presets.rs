//! Relative wake-time presets ("later", "tonight", "tomorrow", …).
//!
//! Each preset turns "now" plus the user's settings into a concrete wake
//! time. Day-boundary presets use `dayStart` / `dayEnd` and the configured
//! week and weekend start days.

use chrono::{DateTime, Days, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SnoozeError};
use crate::recurrence::{at_local, day_index, parse_time};
use crate::settings::Settings;

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

pub fn day_name(index: u8) -> &'static str {
    DAY_NAMES[usize::from(index % 7)]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Later,
    Tonight,
    Tomorrow,
    Weekend,
    NextWeek,
}

impl Preset {
    pub fn all() -> &'static [Preset] {
        &[
            Self::Later,
            Self::Tonight,
            Self::Tomorrow,
            Self::Weekend,
            Self::NextWeek,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Later => "later",
            Self::Tonight => "tonight",
            Self::Tomorrow => "tomorrow",
            Self::Weekend => "weekend",
            Self::NextWeek => "next_week",
        }
    }

    pub fn label(self, settings: &Settings) -> String {
        match self {
            Self::Later => format!("Later (in {}h)", settings.later_hours),
            Self::Tonight => format!("Tonight (at {})", settings.day_end),
            Self::Tomorrow => format!("Tomorrow ({})", settings.day_start),
            Self::Weekend => format!(
                "This Weekend ({}, {})",
                day_name(settings.weekend_start_day),
                settings.day_start
            ),
            Self::NextWeek => format!(
                "Next Week ({}, {})",
                day_name(settings.week_start_day),
                settings.day_start
            ),
        }
    }

    /// Wake time for this preset, evaluated in `now`'s time zone.
    pub fn wake_time<Tz: TimeZone>(
        self,
        settings: &Settings,
        now: &DateTime<Tz>,
    ) -> Result<DateTime<Tz>> {
        let tz = now.timezone();
        let today = now.date_naive();
        let unresolvable = || SnoozeError::InvalidTime(format!("{} preset", self.as_str()));
        let day_start = || {
            parse_time(&settings.day_start)
                .ok_or_else(|| SnoozeError::InvalidTime(settings.day_start.clone()))
        };

        match self {
            Self::Later => chrono::Duration::try_hours(i64::from(settings.later_hours))
                .and_then(|later| now.clone().checked_add_signed(later))
                .ok_or_else(unresolvable),
            Self::Tonight => {
                let end = parse_time(&settings.day_end)
                    .ok_or_else(|| SnoozeError::InvalidTime(settings.day_end.clone()))?;
                let tonight = at_local(&tz, today, end).ok_or_else(unresolvable)?;
                if tonight < *now {
                    now.clone()
                        .checked_add_signed(chrono::Duration::hours(1))
                        .ok_or_else(unresolvable)
                } else {
                    Ok(tonight)
                }
            }
            Self::Tomorrow => {
                let day = today.succ_opt().ok_or_else(unresolvable)?;
                at_local(&tz, day, day_start()?).ok_or_else(unresolvable)
            }
            Self::Weekend => {
                let current = day_index(today);
                let mut ahead = (7 + i16::from(settings.weekend_start_day % 7) - i16::from(current)) % 7;
                if ahead == 0 {
                    ahead = 7;
                }
                let day = today
                    .checked_add_days(Days::new(ahead as u64))
                    .ok_or_else(unresolvable)?;
                at_local(&tz, day, day_start()?).ok_or_else(unresolvable)
            }
            Self::NextWeek => {
                let current = day_index(today);
                let mut ahead = i16::from(settings.week_start_day % 7) - i16::from(current);
                if ahead <= 0 {
                    ahead += 7;
                }
                let day = today
                    .checked_add_days(Days::new(ahead as u64))
                    .ok_or_else(unresolvable)?;
                at_local(&tz, day, day_start()?).ok_or_else(unresolvable)
            }
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Preset {
    type Err = SnoozeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "later" => Ok(Self::Later),
            "tonight" => Ok(Self::Tonight),
            "tomorrow" => Ok(Self::Tomorrow),
            "weekend" => Ok(Self::Weekend),
            "next_week" | "next-week" => Ok(Self::NextWeek),
            other => Err(SnoozeError::InvalidRule(format!(
                "unknown preset '{other}' (expected later, tonight, tomorrow, weekend, next_week)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Utc, Weekday};

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    // 2024-06-05 is a Wednesday.
    fn wednesday(h: u32) -> DateTime<Utc> {
        at(2024, 6, 5, h, 0)
    }

    #[test]
    fn later_adds_configured_hours() {
        let s = Settings {
            later_hours: 3,
            ..Settings::default()
        };
        assert_eq!(Preset::Later.wake_time(&s, &wednesday(10)).unwrap(), wednesday(13));
    }

    #[test]
    fn later_past_the_end_of_time_is_an_error() {
        let s = Settings {
            later_hours: u32::MAX,
            ..Settings::default()
        };
        assert!(matches!(
            Preset::Later.wake_time(&s, &wednesday(10)),
            Err(SnoozeError::InvalidTime(_))
        ));
    }

    #[test]
    fn tonight_uses_day_end_or_an_hour_from_now() {
        let s = Settings::default();
        assert_eq!(Preset::Tonight.wake_time(&s, &wednesday(10)).unwrap(), wednesday(18));
        assert_eq!(Preset::Tonight.wake_time(&s, &wednesday(20)).unwrap(), wednesday(21));
    }

    #[test]
    fn tomorrow_uses_day_start() {
        let s = Settings::default();
        assert_eq!(
            Preset::Tomorrow.wake_time(&s, &wednesday(22)).unwrap(),
            at(2024, 6, 6, 9, 0)
        );
    }

    #[test]
    fn weekend_is_next_weekend_start_never_today() {
        let s = Settings::default();
        let next = Preset::Weekend.wake_time(&s, &wednesday(10)).unwrap();
        assert_eq!(next, at(2024, 6, 8, 9, 0));

        let saturday = at(2024, 6, 8, 8, 0);
        let next = Preset::Weekend.wake_time(&s, &saturday).unwrap();
        assert_eq!(next, at(2024, 6, 15, 9, 0));
    }

    #[test]
    fn next_week_is_strictly_after_today() {
        let s = Settings::default();
        let next = Preset::NextWeek.wake_time(&s, &wednesday(10)).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!(next, at(2024, 6, 10, 9, 0));

        let monday = at(2024, 6, 10, 7, 0);
        assert_eq!(
            Preset::NextWeek.wake_time(&s, &monday).unwrap(),
            at(2024, 6, 17, 9, 0)
        );
    }

    #[test]
    fn labels_interpolate_settings() {
        let s = Settings::default();
        assert_eq!(Preset::Weekend.label(&s), "This Weekend (Saturday, 09:00)");
        assert_eq!(Preset::NextWeek.label(&s), "Next Week (Monday, 09:00)");
        assert_eq!(Preset::Later.label(&s), "Later (in 1h)");
    }

    #[test]
    fn parses_from_string() {
        assert_eq!("next-week".parse::<Preset>().unwrap(), Preset::NextWeek);
        assert!("someday".parse::<Preset>().is_err());
    }

    #[test]
    fn malformed_day_start_is_an_error() {
        let s = Settings {
            day_start: "morning".into(),
            ..Settings::default()
        };
        assert!(Preset::Tomorrow.wake_time(&s, &wednesday(10)).is_err());
    }
}
