//! Trigger serializer.
//!
//! Timer fires, the startup sweep, and caller edits all read-modify-write the
//! same persisted list. [`TriggerQueue`] runs them one at a time in FIFO
//! order so no two of them ever observe an interleaved view.
//!
//! ```text
//!   enqueue ──▶ [ t3 | t2 | t1 ] ──▶ drain task ──▶ t1 ▶ t2 ▶ t3
//!                 VecDeque            (one tokio task while Draining)
//! ```
//!
//! The queue lives only in memory and starts empty on every process start.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::error::SnoozeError;

// ---------------------------------------------------------------------------
// TaskError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Failed(#[from] SnoozeError),

    #[error("task '{task}' panicked: {message}")]
    Panicked { task: &'static str, message: String },

    #[error("task '{0}' was dropped before it ran")]
    Dropped(&'static str),
}

impl From<TaskError> for SnoozeError {
    fn from(e: TaskError) -> Self {
        match e {
            TaskError::Failed(inner) => inner,
            other => SnoozeError::Task(other.to_string()),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// TaskHandle
// ---------------------------------------------------------------------------

/// Resolves once the enqueued task has run, successfully or not.
#[derive(Debug)]
pub struct TaskHandle<T> {
    task: &'static str,
    rx: oneshot::Receiver<Result<T, TaskError>>,
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let task = self.task;
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TaskError::Dropped(task))))
    }
}

// ---------------------------------------------------------------------------
// TriggerQueue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    Idle,
    Draining,
}

#[derive(Default)]
struct Inner {
    tasks: VecDeque<BoxFuture<'static, ()>>,
    draining: bool,
}

/// FIFO, one-at-a-time task runner. Cloning shares the same queue.
#[derive(Clone, Default)]
pub struct TriggerQueue {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for TriggerQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("TriggerQueue")
            .field("pending", &inner.tasks.len())
            .field("draining", &inner.draining)
            .finish()
    }
}

impl TriggerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // The lock is never held across an await, and task bodies run outside
    // it, so a poisoned guard still protects a consistent deque.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> QueueState {
        if self.lock().draining {
            QueueState::Draining
        } else {
            QueueState::Idle
        }
    }

    /// Tasks waiting behind the one currently running.
    pub fn pending(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Append `task` to the tail of the queue.
    ///
    /// Must be called from within a tokio runtime: the first enqueue on an
    /// idle queue spawns the drain task. A task that awaits the handle of a
    /// task enqueued after it will wait forever.
    pub fn enqueue<F, T>(&self, name: &'static str, task: F) -> TaskHandle<T>
    where
        F: Future<Output = crate::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let job = async move {
            let result = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => {
                    tracing::warn!(task = name, error = %e, "trigger task failed");
                    Err(TaskError::Failed(e))
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(task = name, %message, "trigger task panicked");
                    Err(TaskError::Panicked {
                        task: name,
                        message,
                    })
                }
            };
            // The caller may have dropped the handle; the task still ran.
            let _ = tx.send(result);
        }
        .boxed();

        let start_drain = {
            let mut inner = self.lock();
            inner.tasks.push_back(job);
            !std::mem::replace(&mut inner.draining, true)
        };
        tracing::debug!(task = name, start_drain, "trigger task enqueued");

        if start_drain {
            let queue = self.clone();
            tokio::spawn(async move { queue.drain().await });
        }

        TaskHandle { task: name, rx }
    }

    async fn drain(self) {
        loop {
            let next = {
                let mut inner = self.lock();
                match inner.tasks.pop_front() {
                    Some(job) => job,
                    None => {
                        inner.draining = false;
                        return;
                    }
                }
            };
            next.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
