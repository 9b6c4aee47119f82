//! Key-value capability.
//!
//! The scheduler never talks to a database directly; it reads and writes whole
//! JSON values under a handful of keys through [`KvStore`]. Two backends ship
//! with the crate:
//!
//! - [`MemoryKv`]: in-process map, for tests and ephemeral hosts.
//! - [`RedbKv`]: a single redb file, durable across restarts.
//!
//! # RedbKv table design
//!
//! One `KV` table, key = UTF-8 key string, value = JSON bytes. Outside a
//! [`KvStore::lock`] the database file is opened per operation and closed
//! again, so a long-running daemon and short-lived CLI invocations can share
//! it. redb takes an exclusive file lock while open; callers that race for it
//! retry until [`OPEN_TIMEOUT`] passes.
//!
//! # Exclusive sections
//!
//! [`KvStore::lock`] on a `RedbKv` keeps the database open until the guard
//! drops. Every operation through any clone of that `RedbKv` reuses the open
//! handle, and every other process waits on the file lock. One scheduler task
//! holds the guard from its first read to its last write.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redb::{Database, DatabaseError, ReadableTable, TableDefinition};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{Result, SnoozeError};

// ---------------------------------------------------------------------------
// KvStore
// ---------------------------------------------------------------------------

/// Computes the new value for [`KvStore::update`] from the current one.
pub type UpdateFn =
    Box<dyn FnOnce(Option<serde_json::Value>) -> Result<serde_json::Value> + Send>;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Value stored under `key`, or `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Replace the value stored under `key` in a single write.
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;

    /// Read and replace the value under `key` in one transaction. Returns
    /// the value `f` was given. Nothing is written when `f` fails.
    async fn update(&self, key: &str, f: UpdateFn) -> Result<Option<serde_json::Value>>;

    /// Exclusive use of the store until the guard drops, across every handle
    /// and process sharing it. Not reentrant: a holder that calls `lock`
    /// again waits forever.
    async fn lock(&self) -> Result<KvGuard>;
}

/// Releases a [`KvStore::lock`] on drop.
pub struct KvGuard {
    _held: Box<dyn Send + Sync>,
}

impl KvGuard {
    pub fn new(held: impl Send + Sync + 'static) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

impl std::fmt::Debug for KvGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KvGuard")
    }
}

// ---------------------------------------------------------------------------
// MemoryKv
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, serde_json::Value>>,
    exclusive: Arc<Mutex<()>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn update(&self, key: &str, f: UpdateFn) -> Result<Option<serde_json::Value>> {
        let mut entries = self.entries.lock().await;
        let previous = entries.get(key).cloned();
        let next = f(previous.clone())?;
        entries.insert(key.to_string(), next);
        Ok(previous)
    }

    async fn lock(&self) -> Result<KvGuard> {
        Ok(KvGuard::new(self.exclusive.clone().lock_owned().await))
    }
}

// ---------------------------------------------------------------------------
// RedbKv
// ---------------------------------------------------------------------------

const KV: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// How long to wait for another process to release the database file.
pub const OPEN_TIMEOUT: Duration = Duration::from_secs(30);
const OPEN_BACKOFF: Duration = Duration::from_millis(25);

fn db_err(e: impl std::fmt::Display) -> SnoozeError {
    SnoozeError::Storage(e.to_string())
}

fn join_err(e: tokio::task::JoinError) -> SnoozeError {
    SnoozeError::Storage(format!("task join error: {e}"))
}

type HeldDb = Arc<std::sync::Mutex<Option<Arc<Database>>>>;

/// Durable [`KvStore`] backed by a redb file. Clones share one lock.
#[derive(Clone)]
pub struct RedbKv {
    path: PathBuf,
    exclusive: Arc<Mutex<()>>,
    held: HeldDb,
}

impl std::fmt::Debug for RedbKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbKv").field("path", &self.path).finish_non_exhaustive()
    }
}

/// Keeps the database open; closing it releases the file lock.
struct RedbSession {
    held: HeldDb,
    _local: OwnedMutexGuard<()>,
}

impl Drop for RedbSession {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl RedbKv {
    /// Open or create the redb database at `path`.
    ///
    /// Creates the `KV` table if it doesn't already exist, so the first
    /// `get` on a fresh file sees "absent" instead of a missing-table error.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let kv = Self {
            path: path.to_path_buf(),
            exclusive: Arc::new(Mutex::new(())),
            held: Arc::new(std::sync::Mutex::new(None)),
        };
        kv.with_db(|db| {
            let wt = db.begin_write().map_err(db_err)?;
            wt.open_table(KV).map_err(db_err)?;
            wt.commit().map_err(db_err)
        })?;
        Ok(kv)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Database> {
        let deadline = Instant::now() + OPEN_TIMEOUT;
        loop {
            match Database::create(&self.path) {
                Ok(db) => return Ok(db),
                Err(DatabaseError::DatabaseAlreadyOpen) if Instant::now() < deadline => {
                    std::thread::sleep(OPEN_BACKOFF);
                }
                Err(e) => return Err(db_err(e)),
            }
        }
    }

    /// Run `f` on the handle held by a lock, or on a fresh connection.
    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let held = self
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match held {
            Some(db) => f(&db),
            None => f(&self.connect()?),
        }
    }

    fn get_blocking(&self, key: &str) -> Result<Option<serde_json::Value>> {
        self.with_db(|db| {
            let rt = db.begin_read().map_err(db_err)?;
            let table = rt.open_table(KV).map_err(db_err)?;
            let Some(raw) = table.get(key).map_err(db_err)? else {
                return Ok(None);
            };
            let value = serde_json::from_slice(raw.value())?;
            Ok(Some(value))
        })
    }

    fn set_blocking(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.with_db(|db| {
            let wt = db.begin_write().map_err(db_err)?;
            {
                let mut table = wt.open_table(KV).map_err(db_err)?;
                table.insert(key, bytes.as_slice()).map_err(db_err)?;
            }
            wt.commit().map_err(db_err)
        })
    }

    fn update_blocking(&self, key: &str, f: UpdateFn) -> Result<Option<serde_json::Value>> {
        self.with_db(|db| {
            let wt = db.begin_write().map_err(db_err)?;
            let previous = {
                let mut table = wt.open_table(KV).map_err(db_err)?;
                let previous: Option<serde_json::Value> = match table.get(key).map_err(db_err)? {
                    Some(raw) => Some(serde_json::from_slice(raw.value())?),
                    None => None,
                };
                let bytes = serde_json::to_vec(&f(previous.clone())?)?;
                table.insert(key, bytes.as_slice()).map_err(db_err)?;
                previous
            };
            wt.commit().map_err(db_err)?;
            Ok(previous)
        })
    }

    /// All keys currently stored, in key order.
    pub fn keys(&self) -> Result<Vec<String>> {
        self.with_db(|db| {
            let rt = db.begin_read().map_err(db_err)?;
            let table = rt.open_table(KV).map_err(db_err)?;
            let mut keys = Vec::new();
            for entry in table.iter().map_err(db_err)? {
                let (k, _) = entry.map_err(db_err)?;
                keys.push(k.value().to_string());
            }
            Ok(keys)
        })
    }
}

#[async_trait]
impl KvStore for RedbKv {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let kv = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || kv.get_blocking(&key))
            .await
            .map_err(join_err)?
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let kv = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || kv.set_blocking(&key, &value))
            .await
            .map_err(join_err)?
    }

    async fn update(&self, key: &str, f: UpdateFn) -> Result<Option<serde_json::Value>> {
        let kv = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || kv.update_blocking(&key, f))
            .await
            .map_err(join_err)?
    }

    async fn lock(&self) -> Result<KvGuard> {
        let local = self.exclusive.clone().lock_owned().await;
        let kv = self.clone();
        let db = tokio::task::spawn_blocking(move || kv.connect())
            .await
            .map_err(join_err)??;
        *self.held.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(db));
        Ok(KvGuard::new(RedbSession {
            held: self.held.clone(),
            _local: local,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
