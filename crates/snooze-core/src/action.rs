//! Scheduled action data model.
//!
//! A `ScheduledAction` is the persisted unit of deferred work: what to open
//! (`Payload`), when (`wake_time`), and optionally how to repeat
//! (`RecurrenceRule`). The JSON shape is camelCase so that lists exported by
//! the browser front-end load unchanged.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SnoozeError};
use crate::recurrence::{next_occurrence, RecurrenceRule, Weekend};

pub const MAX_NOTE_CHARS: usize = 300;
pub const MAX_CUSTOM_TITLE_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// ActionId
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub i64);

impl ActionId {
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ActionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(ActionId)
    }
}

// ---------------------------------------------------------------------------
// IdAllocator
// ---------------------------------------------------------------------------

/// Mints ids that cannot collide with any id already in a list.
///
/// The first id is `max(now_ms, max_existing + 1)`; later ids increment by
/// one, so several replacements minted in the same millisecond stay unique.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: i64,
}

impl IdAllocator {
    pub fn new<'a>(existing: impl IntoIterator<Item = &'a ScheduledAction>, now_ms: i64) -> Self {
        let max_existing = existing.into_iter().map(|a| a.id.0).max();
        let next = match max_existing {
            Some(max) => now_ms.max(max.saturating_add(1)),
            None => now_ms,
        };
        Self { next }
    }

    pub fn mint(&mut self) -> ActionId {
        let id = ActionId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Everything the executor needs to produce the user-visible effect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    /// Free-text note, at most 300 characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Display title override, at most 200 characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_title: Option<String>,
}

impl Payload {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// The resource to open, if any. Blank URLs count as missing.
    pub fn target(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    pub fn display_title(&self) -> &str {
        self.custom_title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(self.title.as_deref().filter(|t| !t.trim().is_empty()))
            .or(self.url.as_deref())
            .unwrap_or("untitled")
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(note) = &self.note {
            let n = note.chars().count();
            if n > MAX_NOTE_CHARS {
                return Err(SnoozeError::InvalidPayload(format!(
                    "note is {n} characters, limit is {MAX_NOTE_CHARS}"
                )));
            }
        }
        if let Some(title) = &self.custom_title {
            let n = title.chars().count();
            if n > MAX_CUSTOM_TITLE_CHARS {
                return Err(SnoozeError::InvalidPayload(format!(
                    "title override is {n} characters, limit is {MAX_CUSTOM_TITLE_CHARS}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScheduledAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledAction {
    pub id: ActionId,
    #[serde(flatten)]
    pub payload: Payload,
    /// Creation time in ms since epoch. Informational only.
    #[serde(default)]
    pub created_at: i64,
    /// When the action should fire, ms since epoch.
    pub wake_time: i64,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(
        default,
        rename = "recurrencePattern",
        alias = "recurrence",
        skip_serializing_if = "Option::is_none"
    )]
    pub recurrence: Option<RecurrenceRule>,
}

impl ScheduledAction {
    pub fn one_shot(id: ActionId, payload: Payload, created_at: i64, wake_time: i64) -> Self {
        Self {
            id,
            payload,
            created_at,
            wake_time,
            is_recurring: false,
            recurrence: None,
        }
    }

    pub fn recurring(
        id: ActionId,
        payload: Payload,
        created_at: i64,
        wake_time: i64,
        rule: RecurrenceRule,
    ) -> Self {
        Self {
            id,
            payload,
            created_at,
            wake_time,
            is_recurring: true,
            recurrence: Some(rule),
        }
    }

    /// The rule to reschedule with, if this action actually recurs.
    pub fn rule(&self) -> Option<&RecurrenceRule> {
        if self.is_recurring {
            self.recurrence.as_ref()
        } else {
            None
        }
    }

    pub fn is_due(&self, now_ms: i64) -> bool {
        self.wake_time <= now_ms
    }

    /// Next occurrence strictly after `after`, or `None` when the action
    /// does not recur or its rule has run out.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>, weekend: Weekend) -> Option<i64> {
        let rule = self.rule()?;
        next_occurrence(rule, after, weekend).map(|dt| dt.timestamp_millis())
    }

    /// The successor entry for a recurring action. A fresh id is required:
    /// the old id's timer has been consumed and must never match again.
    pub fn rescheduled(&self, id: ActionId, wake_time: i64) -> Self {
        Self {
            id,
            wake_time,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.payload.validate()?;
        if self.is_recurring {
            let rule = self.recurrence.as_ref().ok_or_else(|| {
                SnoozeError::InvalidRule(format!("action {} is recurring but has no rule", self.id))
            })?;
            rule.validate()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ActionDraft
// ---------------------------------------------------------------------------

/// A creation request. The scheduler assigns the id and creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDraft {
    pub payload: Payload,
    /// Explicit wake time. For recurring drafts this may be omitted and the
    /// first occurrence is computed from the rule.
    pub wake_time: Option<i64>,
    pub recurrence: Option<RecurrenceRule>,
}

impl ActionDraft {
    pub fn once(payload: Payload, wake_time: i64) -> Self {
        Self {
            payload,
            wake_time: Some(wake_time),
            recurrence: None,
        }
    }

    pub fn repeating(payload: Payload, rule: RecurrenceRule) -> Self {
        Self {
            payload,
            wake_time: None,
            recurrence: Some(rule),
        }
    }
}

/// Partial edit of an existing action. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionEdit {
    pub wake_time: Option<i64>,
    pub custom_title: Option<String>,
    /// `Some("")` clears the note.
    pub note: Option<String>,
    pub recurrence: Option<RecurrenceRule>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
