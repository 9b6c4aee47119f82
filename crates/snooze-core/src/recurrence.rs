//! Recurrence engine.
//!
//! Pure functions that compute the next wall-clock occurrence of a
//! [`RecurrenceRule`] after a reference instant. Nothing in this module reads
//! the clock or touches storage; the caller supplies `after` and the time zone
//! travels with it, so every rule can be tested at fixed offsets.
//!
//! Day indices follow the stored format: `0 = Sunday … 6 = Saturday`.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SnoozeError};

// ---------------------------------------------------------------------------
// RecurrenceKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceKind {
    Daily,
    Weekdays,
    Weekly,
    Monthly,
    Custom,
    /// Any type string this build does not understand. Kept so one bad entry
    /// cannot make the whole stored list undecodable.
    #[serde(other)]
    Unknown,
}

impl RecurrenceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekdays => "weekdays",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Custom => "custom",
            Self::Unknown => "unknown",
        }
    }

    fn needs_days(self) -> bool {
        matches!(self, Self::Weekly | Self::Custom)
    }
}

impl std::fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecurrenceKind {
    type Err = SnoozeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekdays" => Ok(Self::Weekdays),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "custom" => Ok(Self::Custom),
            other => Err(SnoozeError::InvalidRule(format!(
                "unknown recurrence type '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// RecurrenceRule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    #[serde(rename = "type")]
    pub kind: RecurrenceKind,
    /// Wall-clock time of day, `HH:MM`.
    pub time: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days_of_week: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u32>,
    /// Milliseconds since epoch. Once `after` reaches it, no more occurrences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<i64>,
}

impl RecurrenceRule {
    pub fn new(kind: RecurrenceKind, time: impl Into<String>) -> Self {
        Self {
            kind,
            time: time.into(),
            days_of_week: Vec::new(),
            day_of_month: None,
            end_date: None,
        }
    }

    pub fn with_days(mut self, days: impl IntoIterator<Item = u8>) -> Self {
        self.days_of_week = days.into_iter().collect();
        self
    }

    pub fn with_day_of_month(mut self, day: u32) -> Self {
        self.day_of_month = Some(day);
        self
    }

    pub fn with_end_date(mut self, end_ms: i64) -> Self {
        self.end_date = Some(end_ms);
        self
    }

    /// Creation-time validation. Rules that fail here may still exist in
    /// storage; the engine treats those as having no further occurrence.
    pub fn validate(&self) -> Result<()> {
        if self.kind == RecurrenceKind::Unknown {
            return Err(SnoozeError::InvalidRule("unknown recurrence type".into()));
        }
        parse_time(&self.time).ok_or_else(|| SnoozeError::InvalidTime(self.time.clone()))?;
        if self.kind.needs_days() {
            if self.days_of_week.is_empty() {
                return Err(SnoozeError::InvalidRule(format!(
                    "{} recurrence needs at least one day of week",
                    self.kind
                )));
            }
            if let Some(bad) = self.days_of_week.iter().find(|d| **d > 6) {
                return Err(SnoozeError::InvalidRule(format!(
                    "day of week {bad} out of range 0-6"
                )));
            }
        }
        if let Some(dom) = self.day_of_month {
            if !(1..=31).contains(&dom) {
                return Err(SnoozeError::InvalidRule(format!(
                    "day of month {dom} out of range 1-31"
                )));
            }
        }
        Ok(())
    }

    /// Sorted, deduplicated day set with out-of-range entries dropped.
    fn allowed_days(&self) -> Vec<u8> {
        let mut days: Vec<u8> = self.days_of_week.iter().copied().filter(|d| *d <= 6).collect();
        days.sort_unstable();
        days.dedup();
        days
    }
}

// ---------------------------------------------------------------------------
// Weekend
// ---------------------------------------------------------------------------

/// The two-day weekend starting at `start` (e.g. 6 = Saturday + Sunday).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weekend {
    pub start: u8,
}

impl Weekend {
    pub fn starting(start: u8) -> Self {
        Self { start: start % 7 }
    }

    pub fn contains(self, day: u8) -> bool {
        day == self.start || day == (self.start + 1) % 7
    }
}

impl Default for Weekend {
    fn default() -> Self {
        Self::starting(6)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Parse `HH:MM` (hours 0-23, minutes 0-59).
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let (h, m) = s.trim().split_once(':')?;
    let hours: u32 = h.parse().ok()?;
    let minutes: u32 = m.parse().ok()?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

/// Weekday index with Sunday = 0.
pub fn day_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Resolve a local date + time in `tz`. Ambiguous times take the earliest
/// instant; times inside a DST gap move forward one hour.
pub(crate) fn at_local<Tz: TimeZone>(tz: &Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Tz>> {
    let naive = date.and_time(time);
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + chrono::Duration::hours(1))).earliest())
}

/// `day` of the given month, clamped to the month's last day.
fn clamped_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
    NaiveDate::from_ymd_opt(year, month, day.min(last.day()))
}

/// Compute the next occurrence of `rule` following `after`.
///
/// Returns `None` when the rule has ended (`after >= end_date`), when a
/// weekly/custom rule has no usable days, when the time is malformed, or when
/// the type is unknown.
pub fn next_occurrence<Tz: TimeZone>(
    rule: &RecurrenceRule,
    after: &DateTime<Tz>,
    weekend: Weekend,
) -> Option<DateTime<Tz>> {
    if let Some(end) = rule.end_date {
        if after.timestamp_millis() >= end {
            return None;
        }
    }
    let time = parse_time(&rule.time)?;
    let tz = after.timezone();
    let today = after.date_naive();

    match rule.kind {
        RecurrenceKind::Daily => {
            let candidate = at_local(&tz, today, time)?;
            if candidate > *after {
                Some(candidate)
            } else {
                at_local(&tz, today.succ_opt()?, time)
            }
        }
        RecurrenceKind::Weekdays => {
            let mut day = today.succ_opt()?;
            while weekend.contains(day_index(day)) {
                day = day.succ_opt()?;
            }
            at_local(&tz, day, time)
        }
        RecurrenceKind::Weekly | RecurrenceKind::Custom => {
            let days = rule.allowed_days();
            let first = *days.first()?;
            let current = day_index(today);
            if days.contains(&current) {
                let candidate = at_local(&tz, today, time)?;
                if candidate > *after {
                    return Some(candidate);
                }
            }
            let offset = match days.iter().find(|d| **d > current) {
                Some(d) => d - current,
                None => 7 - current + first,
            };
            at_local(&tz, today.checked_add_days(Days::new(u64::from(offset)))?, time)
        }
        RecurrenceKind::Monthly => {
            let dom = rule.day_of_month.unwrap_or(1).clamp(1, 31);
            let this_month = clamped_day(today.year(), today.month(), dom)?;
            let candidate = at_local(&tz, this_month, time)?;
            if candidate > *after {
                return Some(candidate);
            }
            let next_first = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)?
                .checked_add_months(Months::new(1))?;
            at_local(&tz, clamped_day(next_first.year(), next_first.month(), dom)?, time)
        }
        RecurrenceKind::Unknown => None,
    }
}

/// [`next_occurrence`] over millisecond timestamps, interpreted in `tz`.
pub fn next_occurrence_ms<Tz: TimeZone>(
    rule: &RecurrenceRule,
    after_ms: i64,
    weekend: Weekend,
    tz: &Tz,
) -> Option<i64> {
    let after = tz.timestamp_millis_opt(after_ms).single()?;
    next_occurrence(rule, &after, weekend).map(|dt| dt.timestamp_millis())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc, Weekday};

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    // 2024-06-07 is a Friday.
    fn friday_10am() -> DateTime<Utc> {
        at(2024, 6, 7, 10, 0)
    }

    #[test]
    fn daily_rolls_to_tomorrow_when_time_passed() {
        let rule = RecurrenceRule::new(RecurrenceKind::Daily, "09:00");
        let next = next_occurrence(&rule, &friday_10am(), Weekend::default()).unwrap();
        assert_eq!(next, at(2024, 6, 8, 9, 0));
    }

    #[test]
    fn daily_uses_today_when_time_ahead() {
        let rule = RecurrenceRule::new(RecurrenceKind::Daily, "18:30");
        let next = next_occurrence(&rule, &friday_10am(), Weekend::default()).unwrap();
        assert_eq!(next, at(2024, 6, 7, 18, 30));
    }

    #[test]
    fn daily_at_exact_time_rolls_forward() {
        let rule = RecurrenceRule::new(RecurrenceKind::Daily, "10:00");
        let next = next_occurrence(&rule, &friday_10am(), Weekend::default()).unwrap();
        assert_eq!(next, at(2024, 6, 8, 10, 0));
    }

    #[test]
    fn weekdays_skips_saturday_sunday_weekend() {
        let rule = RecurrenceRule::new(RecurrenceKind::Weekdays, "09:00");
        let next = next_occurrence(&rule, &friday_10am(), Weekend::starting(6)).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!(next, at(2024, 6, 10, 9, 0));
    }

    #[test]
    fn weekdays_honours_configured_weekend() {
        // Friday + Saturday weekend: from Thursday the next weekday is Sunday.
        let rule = RecurrenceRule::new(RecurrenceKind::Weekdays, "08:00");
        let thursday = at(2024, 6, 6, 12, 0);
        let next = next_occurrence(&rule, &thursday, Weekend::starting(5)).unwrap();
        assert_eq!(next, at(2024, 6, 9, 8, 0));
    }

    #[test]
    fn weekdays_starts_from_tomorrow_even_before_time() {
        let rule = RecurrenceRule::new(RecurrenceKind::Weekdays, "23:00");
        let monday_morning = at(2024, 6, 10, 7, 0);
        let next = next_occurrence(&rule, &monday_morning, Weekend::default()).unwrap();
        assert_eq!(next, at(2024, 6, 11, 23, 0));
    }

    #[test]
    fn weekly_picks_later_day_same_week() {
        // Tuesday 08:00, days Mon+Wed, time 09:00 -> Wednesday 09:00.
        let rule = RecurrenceRule::new(RecurrenceKind::Weekly, "09:00").with_days([1, 3]);
        let tuesday = at(2024, 6, 4, 8, 0);
        let next = next_occurrence(&rule, &tuesday, Weekend::default()).unwrap();
        assert_eq!(next, at(2024, 6, 5, 9, 0));
    }

    #[test]
    fn weekly_uses_today_when_allowed_and_ahead() {
        let rule = RecurrenceRule::new(RecurrenceKind::Weekly, "09:00").with_days([2]);
        let tuesday = at(2024, 6, 4, 8, 0);
        let next = next_occurrence(&rule, &tuesday, Weekend::default()).unwrap();
        assert_eq!(next, at(2024, 6, 4, 9, 0));
    }

    #[test]
    fn weekly_wraps_to_next_week_smallest_day() {
        let rule = RecurrenceRule::new(RecurrenceKind::Custom, "09:00").with_days([3, 1]);
        let friday = friday_10am();
        let next = next_occurrence(&rule, &friday, Weekend::default()).unwrap();
        assert_eq!(next, at(2024, 6, 10, 9, 0));
    }

    #[test]
    fn weekly_single_day_already_passed_goes_a_week_out() {
        let rule = RecurrenceRule::new(RecurrenceKind::Weekly, "09:00").with_days([5]);
        let next = next_occurrence(&rule, &friday_10am(), Weekend::default()).unwrap();
        assert_eq!(next, at(2024, 6, 14, 9, 0));
    }

    #[test]
    fn weekly_without_days_has_no_occurrence() {
        let rule = RecurrenceRule::new(RecurrenceKind::Weekly, "09:00");
        assert!(next_occurrence(&rule, &friday_10am(), Weekend::default()).is_none());
        let out_of_range = RecurrenceRule::new(RecurrenceKind::Custom, "09:00").with_days([9]);
        assert!(next_occurrence(&out_of_range, &friday_10am(), Weekend::default()).is_none());
    }

    #[test]
    fn monthly_this_month_when_ahead() {
        let rule = RecurrenceRule::new(RecurrenceKind::Monthly, "09:00").with_day_of_month(15);
        let next = next_occurrence(&rule, &friday_10am(), Weekend::default()).unwrap();
        assert_eq!(next, at(2024, 6, 15, 9, 0));
    }

    #[test]
    fn monthly_rolls_to_next_month() {
        let rule = RecurrenceRule::new(RecurrenceKind::Monthly, "09:00").with_day_of_month(3);
        let next = next_occurrence(&rule, &friday_10am(), Weekend::default()).unwrap();
        assert_eq!(next, at(2024, 7, 3, 9, 0));
    }

    #[test]
    fn monthly_defaults_to_first_of_month() {
        let rule = RecurrenceRule::new(RecurrenceKind::Monthly, "09:00");
        let next = next_occurrence(&rule, &friday_10am(), Weekend::default()).unwrap();
        assert_eq!(next, at(2024, 7, 1, 9, 0));
    }

    #[test]
    fn monthly_day_31_clamps_in_february() {
        let rule = RecurrenceRule::new(RecurrenceKind::Monthly, "09:00").with_day_of_month(31);
        let feb_20 = at(2024, 2, 20, 12, 0);
        let next = next_occurrence(&rule, &feb_20, Weekend::default()).unwrap();
        assert!(next > feb_20);
        assert_eq!(next, at(2024, 2, 29, 9, 0));

        let feb_20_2023 = at(2023, 2, 20, 12, 0);
        let next = next_occurrence(&rule, &feb_20_2023, Weekend::default()).unwrap();
        assert_eq!(next, at(2023, 2, 28, 9, 0));
    }

    #[test]
    fn monthly_day_31_rolling_into_short_month_clamps() {
        let rule = RecurrenceRule::new(RecurrenceKind::Monthly, "09:00").with_day_of_month(31);
        let jan_31_late = at(2025, 1, 31, 10, 0);
        let next = next_occurrence(&rule, &jan_31_late, Weekend::default()).unwrap();
        assert_eq!(next, at(2025, 2, 28, 9, 0));
    }

    #[test]
    fn monthly_rolls_over_year_end() {
        let rule = RecurrenceRule::new(RecurrenceKind::Monthly, "09:00").with_day_of_month(5);
        let dec = at(2024, 12, 20, 9, 0);
        let next = next_occurrence(&rule, &dec, Weekend::default()).unwrap();
        assert_eq!(next, at(2025, 1, 5, 9, 0));
    }

    #[test]
    fn end_date_reached_yields_none() {
        let now = friday_10am();
        let kinds = [
            RecurrenceKind::Daily,
            RecurrenceKind::Weekdays,
            RecurrenceKind::Monthly,
        ];
        for kind in kinds {
            let rule = RecurrenceRule::new(kind, "09:00").with_end_date(now.timestamp_millis());
            assert!(next_occurrence(&rule, &now, Weekend::default()).is_none(), "{kind}");
            let earlier = RecurrenceRule::new(kind, "09:00")
                .with_end_date(now.timestamp_millis() - 1);
            assert!(next_occurrence(&earlier, &now, Weekend::default()).is_none(), "{kind}");
        }
    }

    #[test]
    fn end_date_in_future_still_produces() {
        let now = friday_10am();
        let rule = RecurrenceRule::new(RecurrenceKind::Daily, "09:00")
            .with_end_date(now.timestamp_millis() + 1);
        assert!(next_occurrence(&rule, &now, Weekend::default()).is_some());
    }

    #[test]
    fn malformed_time_and_unknown_kind_yield_none() {
        let bad_time = RecurrenceRule::new(RecurrenceKind::Daily, "25:99");
        assert!(next_occurrence(&bad_time, &friday_10am(), Weekend::default()).is_none());
        let unknown = RecurrenceRule::new(RecurrenceKind::Unknown, "09:00");
        assert!(next_occurrence(&unknown, &friday_10am(), Weekend::default()).is_none());
    }

    #[test]
    fn wall_clock_is_evaluated_in_callers_zone() {
        // 2024-06-07 23:30 at UTC+2 is still Friday locally.
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let after = tz.with_ymd_and_hms(2024, 6, 7, 23, 30, 0).unwrap();
        let rule = RecurrenceRule::new(RecurrenceKind::Daily, "07:00");
        let next = next_occurrence(&rule, &after, Weekend::default()).unwrap();
        assert_eq!(next, tz.with_ymd_and_hms(2024, 6, 8, 7, 0, 0).unwrap());
    }

    #[test]
    fn ms_variant_matches_datetime_variant() {
        let rule = RecurrenceRule::new(RecurrenceKind::Daily, "09:00");
        let after = friday_10am();
        let ms = next_occurrence_ms(&rule, after.timestamp_millis(), Weekend::default(), &Utc);
        assert_eq!(ms, Some(at(2024, 6, 8, 9, 0).timestamp_millis()));
    }

    #[test]
    fn unknown_type_string_deserializes_without_failing() {
        let rule: RecurrenceRule =
            serde_json::from_str(r#"{"type":"fortnightly","time":"09:00"}"#).unwrap();
        assert_eq!(rule.kind, RecurrenceKind::Unknown);
        assert!(rule.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_rules() {
        assert!(RecurrenceRule::new(RecurrenceKind::Daily, "9am").validate().is_err());
        assert!(RecurrenceRule::new(RecurrenceKind::Weekly, "09:00").validate().is_err());
        assert!(RecurrenceRule::new(RecurrenceKind::Weekly, "09:00")
            .with_days([7])
            .validate()
            .is_err());
        assert!(RecurrenceRule::new(RecurrenceKind::Monthly, "09:00")
            .with_day_of_month(32)
            .validate()
            .is_err());
        assert!(RecurrenceRule::new(RecurrenceKind::Custom, "09:00")
            .with_days([0, 6])
            .validate()
            .is_ok());
    }

    #[test]
    fn weekend_pair_wraps_saturday_to_sunday() {
        let weekend = Weekend::starting(6);
        assert!(weekend.contains(6));
        assert!(weekend.contains(0));
        assert!(!weekend.contains(1));
    }
}
