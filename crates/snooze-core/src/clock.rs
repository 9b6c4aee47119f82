use chrono::{DateTime, FixedOffset, Local, Offset, TimeZone, Utc};

use crate::action::ScheduledAction;
use crate::recurrence::{next_occurrence_ms, RecurrenceRule, Weekend};

/// Source of "now" for the scheduler.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The time zone recurrence rules are evaluated in.
///
/// `HH:MM` in a rule is wall-clock time, so the zone decides which instant
/// "09:00" is. Hosts use the machine zone; tests pin a fixed offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Zone {
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl Zone {
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    pub fn next_for_rule(
        &self,
        rule: &RecurrenceRule,
        after_ms: i64,
        weekend: Weekend,
    ) -> Option<i64> {
        match self {
            Self::Local => next_occurrence_ms(rule, after_ms, weekend, &Local),
            Self::Fixed(offset) => next_occurrence_ms(rule, after_ms, weekend, offset),
        }
    }

    /// Next occurrence of `action` after `after_ms`, `None` for one-shot
    /// actions and ended rules.
    pub fn next_for(
        &self,
        action: &ScheduledAction,
        after_ms: i64,
        weekend: Weekend,
    ) -> Option<i64> {
        let after = Utc.timestamp_millis_opt(after_ms).single()?;
        match self {
            Self::Local => action.next_after(&after.with_timezone(&Local), weekend),
            Self::Fixed(offset) => action.next_after(&after.with_timezone(offset), weekend),
        }
    }
}
