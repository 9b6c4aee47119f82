//! Reconciliation controller and caller operations.
//!
//! Every public operation here becomes exactly one [`TriggerQueue`] task, so
//! the startup sweep, timer fires, and edits never interleave their
//! read-modify-write of the action list.
//!
//! # At-most-once
//!
//! Two signals can both claim an action is due: its timer firing, and the
//! startup sweep noticing `wakeTime <= now`. Both paths write the new list
//! (due entries removed, recurring ones replaced under a fresh id) *before*
//! invoking the executor. Whichever runs second then looks up the original
//! id, finds nothing, and does nothing.
//!
//! The queue orders tasks within one process. Each task also holds
//! [`KvStore::lock`] from its first read to its last write, so schedulers in
//! other processes sharing the same store cannot interleave with it either.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;

use crate::action::{ActionDraft, ActionEdit, ActionId, IdAllocator, ScheduledAction};
use crate::clock::{Clock, SystemClock, Zone};
use crate::error::{Result, SnoozeError};
use crate::executor::{Executor, Notification, OpenMode};
use crate::kv::KvStore;
use crate::queue::{QueueState, TaskHandle, TriggerQueue};
use crate::settings::Settings;
use crate::store::{merge_import, ActionStore, ImportMode};
use crate::timer::{TimerGateway, TimerId};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What one reconciliation sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Due actions whose effect was produced.
    pub executed: usize,
    /// Due recurring actions replaced by their next occurrence.
    pub rescheduled: usize,
    /// Due recurring actions whose rule has no further occurrence.
    pub ended: usize,
    /// Future actions left untouched.
    pub kept: usize,
    /// Extra entries sharing an id with another due entry.
    pub duplicates: usize,
    pub arm_failures: usize,
    pub execute_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FireOutcome {
    /// The action was consumed. `rescheduled_as` names its successor.
    Executed { rescheduled_as: Option<ActionId> },
    /// The action had nothing to open. It was consumed without an effect.
    Skipped { rescheduled_as: Option<ActionId> },
    /// No live action for this timer: already consumed or never existed.
    Stale,
    /// The timer name does not belong to this scheduler.
    Foreign,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Cloning is cheap; clones share the same queue and collaborators.
#[derive(Clone)]
pub struct Scheduler {
    store: ActionStore,
    kv: Arc<dyn KvStore>,
    timers: Arc<dyn TimerGateway>,
    executor: Arc<dyn Executor>,
    clock: Arc<dyn Clock>,
    zone: Zone,
    queue: TriggerQueue,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("zone", &self.zone)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(
        kv: Arc<dyn KvStore>,
        timers: Arc<dyn TimerGateway>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            store: ActionStore::new(kv.clone()),
            kv,
            timers,
            executor,
            clock: Arc::new(SystemClock),
            zone: Zone::Local,
            queue: TriggerQueue::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_zone(mut self, zone: Zone) -> Self {
        self.zone = zone;
        self
    }

    pub fn queue_state(&self) -> QueueState {
        self.queue.state()
    }

    fn now_ms(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    /// Enqueue `task`, holding the store lock while it runs.
    fn submit<T, F, Fut>(&self, name: &'static str, task: F) -> TaskHandle<T>
    where
        F: FnOnce(Scheduler) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let this = self.clone();
        self.queue.enqueue(name, async move {
            let _exclusive = this.kv.lock().await?;
            task(this).await
        })
    }

    // -----------------------------------------------------------------------
    // Trigger entry points
    // -----------------------------------------------------------------------

    /// Enqueue the startup sweep without waiting for it.
    pub fn submit_reconcile(&self) -> TaskHandle<SweepReport> {
        self.submit("reconcile", |s| async move { s.sweep().await })
    }

    /// Run the startup sweep: execute every overdue action once, reschedule
    /// recurring ones, and arm a timer for everything left pending.
    pub async fn reconcile(&self) -> Result<SweepReport> {
        Ok(self.submit_reconcile().await?)
    }

    /// Enqueue a timer-fire event without waiting for it.
    pub fn submit_timer_fired(&self, timer: TimerId) -> TaskHandle<FireOutcome> {
        self.submit("timer_fired", move |s| async move { s.fire(timer).await })
    }

    pub async fn timer_fired(&self, timer: TimerId) -> Result<FireOutcome> {
        Ok(self.submit_timer_fired(timer).await?)
    }

    // -----------------------------------------------------------------------
    // Caller operations
    // -----------------------------------------------------------------------

    /// Persist a new action and arm its timer.
    pub async fn schedule(&self, draft: ActionDraft) -> Result<ScheduledAction> {
        Ok(self
            .submit("schedule", move |s| async move { s.schedule_task(draft).await })
            .await?)
    }

    /// Drop an action and cancel its timer.
    pub async fn remove(&self, id: ActionId) -> Result<ScheduledAction> {
        Ok(self
            .submit("remove", move |s| async move { s.remove_task(id).await })
            .await?)
    }

    /// Execute an action now instead of at its wake time.
    ///
    /// One-shot actions are consumed. Recurring actions skip ahead to the
    /// occurrence after their current wake time, under a new id.
    pub async fn wake_now(&self, id: ActionId) -> Result<FireOutcome> {
        Ok(self
            .submit("wake_now", move |s| async move { s.wake_task(id).await })
            .await?)
    }

    pub async fn update(&self, id: ActionId, edit: ActionEdit) -> Result<ScheduledAction> {
        Ok(self
            .submit("update", move |s| async move { s.update_task(id, edit).await })
            .await?)
    }

    /// Load an imported list. Returns the entries that were armed.
    pub async fn import(
        &self,
        actions: Vec<ScheduledAction>,
        mode: ImportMode,
    ) -> Result<Vec<ScheduledAction>> {
        Ok(self
            .submit("import", move |s| async move { s.import_task(actions, mode).await })
            .await?)
    }

    /// Snapshot of pending actions, soonest first.
    pub async fn list(&self) -> Result<Vec<ScheduledAction>> {
        Ok(self
            .submit("list", |s| async move {
                let mut actions = s.store.load_all().await?;
                actions.sort_by_key(|a| (a.wake_time, a.id));
                Ok(actions)
            })
            .await?)
    }

    // -----------------------------------------------------------------------
    // Task bodies (always run inside the queue)
    // -----------------------------------------------------------------------

    async fn sweep(&self) -> Result<SweepReport> {
        let actions = self.store.load_all().await?;
        let settings = Settings::load(self.kv.as_ref()).await?;
        let now_ms = self.now_ms();
        let mut report = SweepReport::default();

        let mut ids = IdAllocator::new(&actions, now_ms);
        let (due, kept): (Vec<_>, Vec<_>) =
            actions.into_iter().partition(|a| a.is_due(now_ms));

        let due_total = due.len();
        let mut seen = HashSet::new();
        let due: Vec<ScheduledAction> = due.into_iter().filter(|a| seen.insert(a.id)).collect();
        report.duplicates = due_total - due.len();
        report.kept = kept.len();

        let mut next_list = kept;
        for action in due.iter().filter(|a| a.is_recurring) {
            match self.zone.next_for(action, now_ms, settings.weekend()) {
                Some(wake) => {
                    let successor = action.rescheduled(ids.mint(), wake);
                    tracing::info!(
                        action_id = %action.id,
                        successor = %successor.id,
                        wake_time = wake,
                        "rescheduled recurring action"
                    );
                    next_list.push(successor);
                    report.rescheduled += 1;
                }
                None => {
                    tracing::info!(action_id = %action.id, "recurrence ended");
                    report.ended += 1;
                }
            }
        }

        // Persist before any effect: a timer fire queued behind this task
        // must find its id gone.
        self.store.save_all(&next_list).await?;

        let mode = settings.open_mode();
        for action in &due {
            self.cancel(&TimerId::for_action(action.id)).await;
            match self.perform(action, mode).await {
                Ok(true) => report.executed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(action_id = %action.id, error = %e, "failed to execute overdue action");
                    report.execute_failures += 1;
                }
            }
        }
        if report.executed > 0 {
            self.executor
                .notify(&Notification::sweep_summary(report.executed));
        }

        for action in &next_list {
            if !self.arm(action).await {
                report.arm_failures += 1;
            }
        }

        tracing::info!(
            executed = report.executed,
            rescheduled = report.rescheduled,
            ended = report.ended,
            kept = report.kept,
            "reconciliation complete"
        );
        Ok(report)
    }

    async fn fire(&self, timer: TimerId) -> Result<FireOutcome> {
        let Some(id) = timer.action_id() else {
            tracing::debug!(timer_id = %timer, "ignoring foreign timer");
            return Ok(FireOutcome::Foreign);
        };

        let actions = self.store.load_all().await?;
        let Some(action) = actions.iter().find(|a| a.id == id).cloned() else {
            tracing::info!(timer_id = %timer, "timer has no live action; already consumed");
            return Ok(FireOutcome::Stale);
        };
        let settings = Settings::load(self.kv.as_ref()).await?;
        let now_ms = self.now_ms();
        let successor = self
            .zone
            .next_for(&action, now_ms, settings.weekend())
            .map(|wake| action.rescheduled(IdAllocator::new(&actions, now_ms).mint(), wake));
        if action.is_recurring && successor.is_none() {
            tracing::info!(action_id = %id, "recurrence ended");
        }

        let mut next_list: Vec<ScheduledAction> =
            actions.into_iter().filter(|a| a.id != id).collect();
        next_list.extend(successor.iter().cloned());
        self.store.save_all(&next_list).await?;

        let outcome = self.execute(&action, settings.open_mode(), successor.as_ref()).await;
        if let Some(next) = &successor {
            self.arm(next).await;
        }
        Ok(outcome)
    }

    async fn schedule_task(&self, draft: ActionDraft) -> Result<ScheduledAction> {
        draft.payload.validate()?;
        if let Some(rule) = &draft.recurrence {
            rule.validate()?;
        }

        let now_ms = self.now_ms();
        let wake_time = match (draft.wake_time, &draft.recurrence) {
            (Some(wake), _) => wake,
            (None, Some(rule)) => {
                let settings = Settings::load(self.kv.as_ref()).await?;
                self.zone
                    .next_for_rule(rule, now_ms, settings.weekend())
                    .ok_or_else(|| {
                        SnoozeError::InvalidRule("rule has no future occurrence".into())
                    })?
            }
            (None, None) => {
                return Err(SnoozeError::InvalidTime(
                    "a one-time action needs a wake time".into(),
                ))
            }
        };

        let mut actions = self.store.load_all().await?;
        let id = IdAllocator::new(&actions, now_ms).mint();
        let action = match draft.recurrence {
            Some(rule) => ScheduledAction::recurring(id, draft.payload, now_ms, wake_time, rule),
            None => ScheduledAction::one_shot(id, draft.payload, now_ms, wake_time),
        };
        actions.push(action.clone());
        self.store.save_all(&actions).await?;
        self.arm(&action).await;

        tracing::info!(action_id = %action.id, wake_time, "scheduled action");
        Ok(action)
    }

    async fn remove_task(&self, id: ActionId) -> Result<ScheduledAction> {
        let actions = self.store.load_all().await?;
        let removed = actions
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(SnoozeError::ActionNotFound(id))?;
        let remaining: Vec<ScheduledAction> =
            actions.into_iter().filter(|a| a.id != id).collect();
        self.store.save_all(&remaining).await?;
        self.cancel(&TimerId::for_action(id)).await;

        tracing::info!(action_id = %id, "removed action");
        Ok(removed)
    }

    async fn wake_task(&self, id: ActionId) -> Result<FireOutcome> {
        let actions = self.store.load_all().await?;
        let action = actions
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(SnoozeError::ActionNotFound(id))?;

        let settings = Settings::load(self.kv.as_ref()).await?;
        let now_ms = self.now_ms();
        let after = action.wake_time.max(now_ms);
        let successor = self
            .zone
            .next_for(&action, after, settings.weekend())
            .map(|wake| action.rescheduled(IdAllocator::new(&actions, now_ms).mint(), wake));

        let mut next_list: Vec<ScheduledAction> =
            actions.into_iter().filter(|a| a.id != id).collect();
        next_list.extend(successor.iter().cloned());
        self.store.save_all(&next_list).await?;
        self.cancel(&TimerId::for_action(id)).await;

        let outcome = self.execute(&action, settings.open_mode(), successor.as_ref()).await;
        if let Some(next) = &successor {
            self.arm(next).await;
        }
        Ok(outcome)
    }

    async fn update_task(&self, id: ActionId, edit: ActionEdit) -> Result<ScheduledAction> {
        let mut actions = self.store.load_all().await?;
        let now_ms = self.now_ms();
        let index = actions
            .iter()
            .position(|a| a.id == id)
            .ok_or(SnoozeError::ActionNotFound(id))?;

        let mut action = actions[index].clone();
        if let Some(title) = edit.custom_title {
            action.payload.custom_title = Some(title).filter(|t| !t.trim().is_empty());
        }
        if let Some(note) = edit.note {
            action.payload.note = Some(note).filter(|n| !n.trim().is_empty());
        }
        if let Some(rule) = edit.recurrence {
            rule.validate()?;
            if edit.wake_time.is_none() {
                let settings = Settings::load(self.kv.as_ref()).await?;
                action.wake_time = self
                    .zone
                    .next_for_rule(&rule, now_ms, settings.weekend())
                    .ok_or(SnoozeError::NoFurtherOccurrence(id))?;
            }
            action.is_recurring = true;
            action.recurrence = Some(rule);
        }
        if let Some(wake) = edit.wake_time {
            action.wake_time = wake;
        }
        action.validate()?;

        actions[index] = action.clone();
        self.store.save_all(&actions).await?;
        self.arm(&action).await;

        tracing::info!(action_id = %id, wake_time = action.wake_time, "updated action");
        Ok(action)
    }

    async fn import_task(
        &self,
        incoming: Vec<ScheduledAction>,
        mode: ImportMode,
    ) -> Result<Vec<ScheduledAction>> {
        let armed = match mode {
            ImportMode::Replace => {
                for timer in self.timers.list_all().await? {
                    if timer.is_action_timer() {
                        self.cancel(&timer).await;
                    }
                }
                self.store.save_all(&incoming).await?;
                incoming
            }
            ImportMode::Merge => {
                let existing = self.store.load_all().await?;
                let (merged, adjusted) = merge_import(existing, incoming, self.now_ms());
                self.store.save_all(&merged).await?;
                adjusted
            }
        };
        for action in &armed {
            self.arm(action).await;
        }
        tracing::info!(count = armed.len(), ?mode, "imported actions");
        Ok(armed)
    }

    // -----------------------------------------------------------------------
    // Collaborator calls (failures logged, never fatal)
    // -----------------------------------------------------------------------

    /// Perform a single consumed action and notify on success.
    async fn execute(
        &self,
        action: &ScheduledAction,
        mode: OpenMode,
        successor: Option<&ScheduledAction>,
    ) -> FireOutcome {
        let rescheduled_as = successor.map(|s| s.id);
        match self.perform(action, mode).await {
            Ok(true) => self.executor.notify(&Notification::action_fired(action)),
            Ok(false) => return FireOutcome::Skipped { rescheduled_as },
            Err(e) => {
                tracing::warn!(action_id = %action.id, error = %e, "failed to execute action")
            }
        }
        FireOutcome::Executed { rescheduled_as }
    }

    /// `Ok(false)` when the action has nothing to open.
    async fn perform(&self, action: &ScheduledAction, mode: OpenMode) -> Result<bool> {
        if action.payload.target().is_none() {
            tracing::warn!(action_id = %action.id, "action has nothing to open");
            return Ok(false);
        }
        self.executor.perform(&action.payload, mode).await?;
        tracing::info!(action_id = %action.id, ?mode, "executed action");
        Ok(true)
    }

    async fn arm(&self, action: &ScheduledAction) -> bool {
        let timer = TimerId::for_action(action.id);
        match self.timers.arm(&timer, action.wake_time).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(timer_id = %timer, error = %e, "failed to arm timer");
                false
            }
        }
    }

    async fn cancel(&self, timer: &TimerId) {
        if let Err(e) = self.timers.cancel(timer).await {
            tracing::warn!(timer_id = %timer, error = %e, "failed to cancel timer");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
