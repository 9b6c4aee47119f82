//! Timer gateway persisted in the key-value store.
//!
//! Armed timers are a JSON map `{ timer id: when_ms }` under the `timers`
//! key, so they survive restarts of the daemon and are visible to one-shot
//! CLI invocations that share the same database.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use snooze_core::kv::KvStore;
use snooze_core::timer::{TimerGateway, TimerId};
use snooze_core::Result;

pub const TIMERS_KEY: &str = "timers";

#[derive(Clone)]
pub struct KvTimers {
    kv: Arc<dyn KvStore>,
}

fn decode(value: Option<serde_json::Value>) -> Result<BTreeMap<TimerId, i64>> {
    match value {
        Some(v) if !v.is_null() => Ok(serde_json::from_value(v)?),
        _ => Ok(BTreeMap::new()),
    }
}

impl KvTimers {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Apply `f` to the timer map in one store transaction. Returns the map
    /// as it was before `f` ran.
    async fn modify(
        &self,
        f: impl FnOnce(&mut BTreeMap<TimerId, i64>) + Send + 'static,
    ) -> Result<BTreeMap<TimerId, i64>> {
        let previous = self
            .kv
            .update(
                TIMERS_KEY,
                Box::new(move |value| {
                    let mut timers = decode(value)?;
                    f(&mut timers);
                    Ok(serde_json::to_value(&timers)?)
                }),
            )
            .await?;
        decode(previous)
    }

    /// All armed timers with their due times.
    pub async fn entries(&self) -> Result<BTreeMap<TimerId, i64>> {
        decode(self.kv.get(TIMERS_KEY).await?)
    }

    /// Remove and return every timer due at `now_ms`, earliest first.
    ///
    /// The read and the removal are one transaction, so an `arm` from
    /// another process lands either before (and may be taken) or after.
    pub async fn take_due(&self, now_ms: i64) -> Result<Vec<TimerId>> {
        let before = self
            .modify(move |timers| timers.retain(|_, when| *when > now_ms))
            .await?;

        let mut due: Vec<(TimerId, i64)> = before
            .into_iter()
            .filter(|(_, when)| *when <= now_ms)
            .collect();
        due.sort_by_key(|(id, when)| (*when, id.clone()));
        Ok(due.into_iter().map(|(id, _)| id).collect())
    }
}

#[async_trait]
impl TimerGateway for KvTimers {
    async fn arm(&self, timer: &TimerId, when_ms: i64) -> Result<()> {
        let id = timer.clone();
        self.modify(move |timers| {
            timers.insert(id, when_ms);
        })
        .await?;
        tracing::debug!(timer_id = %timer, when_ms, "armed timer");
        Ok(())
    }

    async fn cancel(&self, timer: &TimerId) -> Result<()> {
        let id = timer.clone();
        let before = self
            .modify(move |timers| {
                timers.remove(&id);
            })
            .await?;
        if before.contains_key(timer) {
            tracing::debug!(timer_id = %timer, "cancelled timer");
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<TimerId>> {
        Ok(self.entries().await?.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snooze_core::action::ActionId;
    use snooze_core::kv::{MemoryKv, RedbKv};

    fn timers() -> KvTimers {
        KvTimers::new(Arc::new(MemoryKv::new()))
    }

    #[tokio::test]
    async fn arm_cancel_and_list() {
        let t = timers();
        let a = TimerId::for_action(ActionId(1));
        let b = TimerId::for_action(ActionId(2));
        t.arm(&a, 100).await.unwrap();
        t.arm(&b, 200).await.unwrap();
        t.arm(&a, 150).await.unwrap();

        assert_eq!(t.list_all().await.unwrap(), vec![a.clone(), b.clone()]);
        assert_eq!(t.entries().await.unwrap().get(&a), Some(&150));

        t.cancel(&a).await.unwrap();
        t.cancel(&TimerId::new("never-armed")).await.unwrap();
        assert_eq!(t.list_all().await.unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn take_due_removes_only_due_timers_in_time_order() {
        let t = timers();
        let late = TimerId::for_action(ActionId(1));
        let early = TimerId::for_action(ActionId(2));
        let future = TimerId::for_action(ActionId(3));
        t.arm(&late, 50).await.unwrap();
        t.arm(&early, 10).await.unwrap();
        t.arm(&future, 500).await.unwrap();

        assert_eq!(t.take_due(100).await.unwrap(), vec![early, late]);
        assert!(t.take_due(100).await.unwrap().is_empty());
        assert_eq!(t.list_all().await.unwrap(), vec![future]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn arms_from_another_handle_survive_concurrent_take_due() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("snooze.redb");
        // Two handles on one file, as the daemon and a CLI command would have.
        let daemon = KvTimers::new(Arc::new(RedbKv::open(&path).unwrap()));
        let cli = KvTimers::new(Arc::new(RedbKv::open(&path).unwrap()));

        let arming = tokio::spawn(async move {
            for i in 0..20 {
                cli.arm(&TimerId::for_action(ActionId(i)), 1_000 + i).await.unwrap();
            }
        });
        let mut taken = Vec::new();
        while !arming.is_finished() {
            taken.extend(daemon.take_due(1_010).await.unwrap());
        }
        arming.await.unwrap();
        taken.extend(daemon.take_due(1_010).await.unwrap());

        let remaining = daemon.list_all().await.unwrap();
        assert_eq!(taken.len(), 11);
        assert_eq!(remaining.len(), 9);
        assert!(taken.iter().all(|t| !remaining.contains(t)));
    }
}
