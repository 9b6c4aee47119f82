//! Flags shared by `add` and `edit`.

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, Local};
use clap::Args;
use snooze_core::presets::Preset;
use snooze_core::recurrence::{RecurrenceKind, RecurrenceRule};
use snooze_core::settings::Settings;

use crate::when::{parse_at, parse_days, parse_duration, parse_until};

#[derive(Args, Debug, Default)]
pub struct WhenArgs {
    /// Wake at a time: 'YYYY-MM-DD HH:MM', 'HH:MM', or RFC 3339
    #[arg(long, value_name = "TIME", conflicts_with_all = ["in_", "preset"])]
    pub at: Option<String>,

    /// Wake after a delay, e.g. 90m, 2h30m, 1d
    #[arg(long = "in", value_name = "DURATION", conflicts_with = "preset")]
    pub in_: Option<String>,

    /// Wake at a preset: later, tonight, tomorrow, weekend, next_week
    #[arg(long, value_name = "PRESET")]
    pub preset: Option<Preset>,
}

impl WhenArgs {
    pub fn resolve(
        &self,
        settings: &Settings,
        now: &DateTime<Local>,
    ) -> anyhow::Result<Option<DateTime<Local>>> {
        if let Some(at) = &self.at {
            return parse_at(at, now).map(Some);
        }
        if let Some(delay) = &self.in_ {
            let wake = now
                .checked_add_signed(parse_duration(delay)?)
                .ok_or_else(|| anyhow!("'{delay}' from now is out of range"))?;
            return Ok(Some(wake));
        }
        if let Some(preset) = self.preset {
            let wake = preset
                .wake_time(settings, now)
                .with_context(|| format!("cannot resolve preset '{preset}'"))?;
            return Ok(Some(wake));
        }
        Ok(None)
    }
}

#[derive(Args, Debug, Default)]
pub struct RuleArgs {
    /// Repeat: daily, weekdays, weekly, monthly, custom
    #[arg(long, value_name = "KIND")]
    pub every: Option<RecurrenceKind>,

    /// Time of day for repeats (default: the dayStart setting)
    #[arg(long, value_name = "HH:MM", requires = "every")]
    pub time: Option<String>,

    /// Days for weekly/custom repeats, e.g. mon,wed or 1,3
    #[arg(long, value_delimiter = ',', requires = "every")]
    pub days: Vec<String>,

    /// Day of month for monthly repeats (1-31; clamps in short months)
    #[arg(long, value_name = "DAY", requires = "every")]
    pub day_of_month: Option<u32>,

    /// Stop repeating after this date or time
    #[arg(long, value_name = "DATE", requires = "every")]
    pub until: Option<String>,
}

impl RuleArgs {
    pub fn to_rule(
        &self,
        settings: &Settings,
        now: &DateTime<Local>,
    ) -> anyhow::Result<Option<RecurrenceRule>> {
        let Some(kind) = self.every else {
            return Ok(None);
        };

        let time = self.time.clone().unwrap_or_else(|| settings.day_start.clone());
        let mut rule = RecurrenceRule::new(kind, time);
        match kind {
            RecurrenceKind::Weekly | RecurrenceKind::Custom => {
                let days = parse_days(&self.days)?;
                if days.is_empty() {
                    bail!("--every {kind} needs --days (e.g. --days mon,wed)");
                }
                rule = rule.with_days(days);
            }
            RecurrenceKind::Monthly => {
                rule = rule.with_day_of_month(self.day_of_month.unwrap_or(1));
            }
            _ => {}
        }
        if let Some(until) = &self.until {
            rule = rule.with_end_date(parse_until(until, now)?.timestamp_millis());
        }

        rule.validate()?;
        Ok(Some(rule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 7, 12, 0, 0).earliest().unwrap()
    }

    #[test]
    fn no_flags_resolve_to_nothing() {
        let settings = Settings::default();
        assert!(WhenArgs::default().resolve(&settings, &now()).unwrap().is_none());
        assert!(RuleArgs::default().to_rule(&settings, &now()).unwrap().is_none());
    }

    #[test]
    fn in_is_relative_to_now() {
        let args = WhenArgs {
            in_: Some("2h".into()),
            ..WhenArgs::default()
        };
        let wake = args.resolve(&Settings::default(), &now()).unwrap().unwrap();
        assert_eq!(wake - now(), chrono::Duration::hours(2));
    }

    #[test]
    fn in_past_the_end_of_time_is_an_error() {
        let args = WhenArgs {
            in_: Some("100000000w".into()),
            ..WhenArgs::default()
        };
        let err = args.resolve(&Settings::default(), &now()).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");
    }

    #[test]
    fn weekly_rule_requires_days() {
        let args = RuleArgs {
            every: Some(RecurrenceKind::Weekly),
            ..RuleArgs::default()
        };
        assert!(args.to_rule(&Settings::default(), &now()).is_err());

        let args = RuleArgs {
            every: Some(RecurrenceKind::Weekly),
            days: vec!["mon".into(), "wed".into()],
            ..RuleArgs::default()
        };
        let rule = args.to_rule(&Settings::default(), &now()).unwrap().unwrap();
        assert_eq!(rule.days_of_week, vec![1, 3]);
        assert_eq!(rule.time, "09:00");
    }

    #[test]
    fn rule_time_defaults_to_day_start() {
        let settings = Settings {
            day_start: "07:45".into(),
            ..Settings::default()
        };
        let args = RuleArgs {
            every: Some(RecurrenceKind::Daily),
            ..RuleArgs::default()
        };
        assert_eq!(args.to_rule(&settings, &now()).unwrap().unwrap().time, "07:45");
    }

    #[test]
    fn monthly_rule_defaults_to_first() {
        let args = RuleArgs {
            every: Some(RecurrenceKind::Monthly),
            ..RuleArgs::default()
        };
        let rule = args.to_rule(&Settings::default(), &now()).unwrap().unwrap();
        assert_eq!(rule.day_of_month, Some(1));
    }
}
