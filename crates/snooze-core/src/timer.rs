//! Timer gateway contract.
//!
//! The host owns the actual wall-clock timers. The core only needs to arm,
//! cancel, and enumerate them by name, and to be told when one fires. Timer
//! names encode the action id: `scheduled-action-{id}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::action::ActionId;
use crate::error::Result;

pub const TIMER_PREFIX: &str = "scheduled-action-";
/// Prefix written by the browser build; still recognized when parsing.
pub const LEGACY_TIMER_PREFIX: &str = "snoozed-tab-";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(String);

impl TimerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn for_action(id: ActionId) -> Self {
        Self(format!("{TIMER_PREFIX}{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The action this timer belongs to, or `None` for timers that are not
    /// ours (other prefixes, non-numeric suffixes).
    pub fn action_id(&self) -> Option<ActionId> {
        let rest = self
            .0
            .strip_prefix(TIMER_PREFIX)
            .or_else(|| self.0.strip_prefix(LEGACY_TIMER_PREFIX))?;
        rest.parse().ok()
    }

    pub fn is_action_timer(&self) -> bool {
        self.action_id().is_some()
    }
}

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deferred, restart-surviving callback scheduling supplied by the host.
///
/// A fired timer is reported out-of-band to `Scheduler::timer_fired`. There is
/// no guarantee that a timer fires while the process is down; the startup
/// sweep covers that gap.
#[async_trait]
pub trait TimerGateway: Send + Sync {
    /// Arm (or re-arm) `timer` to fire at-or-after `when_ms`.
    async fn arm(&self, timer: &TimerId, when_ms: i64) -> Result<()>;

    /// Disarm `timer`. Cancelling an unknown timer is not an error.
    async fn cancel(&self, timer: &TimerId) -> Result<()>;

    async fn list_all(&self) -> Result<Vec<TimerId>>;
}
