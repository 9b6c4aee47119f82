//! Host wiring: the on-disk store, persisted timers, and the configured
//! executor, assembled into a [`Scheduler`].

pub mod executor;
pub mod timers;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use snooze_core::config::{ExecutorKind, HostConfig};
use snooze_core::executor::Executor;
use snooze_core::kv::{KvStore, RedbKv};
use snooze_core::scheduler::Scheduler;
use snooze_core::settings::Settings;
use snooze_core::{io, paths};

use executor::{DesktopExecutor, LogExecutor};
use timers::KvTimers;

pub struct Host {
    pub data_dir: PathBuf,
    pub config: HostConfig,
    pub kv: Arc<RedbKv>,
    pub timers: Arc<KvTimers>,
    pub scheduler: Scheduler,
}

impl Host {
    /// Open (creating on first use) the data directory.
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        io::ensure_dir(data_dir)
            .with_context(|| format!("cannot create data directory {}", data_dir.display()))?;
        let config = HostConfig::load(data_dir).context("failed to load config.yaml")?;
        if !paths::config_path(data_dir).exists() {
            config
                .save(data_dir)
                .context("failed to write default config.yaml")?;
        }

        let db = paths::db_path(data_dir);
        let kv = Arc::new(
            RedbKv::open(&db).with_context(|| format!("cannot open database {}", db.display()))?,
        );
        let timers = Arc::new(KvTimers::new(kv.clone()));
        let executor: Arc<dyn Executor> = match config.executor {
            ExecutorKind::Desktop => Arc::new(DesktopExecutor::new(config.launcher.clone())),
            ExecutorKind::Log => Arc::new(LogExecutor),
        };
        let scheduler = Scheduler::new(kv.clone(), timers.clone(), executor);

        tracing::debug!(data_dir = %data_dir.display(), executor = ?config.executor, "host opened");
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            config,
            kv,
            timers,
            scheduler,
        })
    }

    pub async fn settings(&self) -> anyhow::Result<Settings> {
        Settings::load(self.kv.as_ref() as &dyn KvStore)
            .await
            .context("failed to load settings")
    }
}
