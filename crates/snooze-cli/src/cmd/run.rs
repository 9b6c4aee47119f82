//! The daemon: reconcile on startup, then poll persisted timers.

use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use snooze_core::config::WarnLevel;
use snooze_core::scheduler::FireOutcome;

use crate::host::Host;
use crate::output::print_json;

pub async fn run(host: &Host, once: bool, json: bool) -> anyhow::Result<()> {
    let warnings = host.config.validate();
    for w in &warnings {
        match w.level {
            WarnLevel::Warning => tracing::warn!("{}", w.message),
            WarnLevel::Error => tracing::error!("{}", w.message),
        }
    }
    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        bail!("config.yaml has errors; run `snooze settings check`");
    }

    let report = host
        .scheduler
        .reconcile()
        .await
        .context("startup reconciliation failed")?;
    tracing::info!(
        executed = report.executed,
        rescheduled = report.rescheduled,
        kept = report.kept,
        "startup sweep complete"
    );

    if once {
        let fired = fire_due(host).await?;
        if json {
            print_json(&serde_json::json!({ "sweep": report, "fired": fired }))?;
        } else {
            println!(
                "Executed {} on sweep, {} from timers",
                report.executed, fired
            );
        }
        return Ok(());
    }

    let tick = Duration::from_millis(host.config.tick_ms.max(1));
    tracing::info!(
        data_dir = %host.data_dir.display(),
        tick_ms = host.config.tick_ms,
        "snooze daemon running"
    );

    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = fire_due(host).await {
                    tracing::warn!(error = %e, "timer poll failed");
                }
            }
            _ = &mut shutdown => {
                tracing::info!("shutting down");
                return Ok(());
            }
        }
    }
}

/// Deliver every persisted timer that has come due. Returns how many
/// actions were executed.
async fn fire_due(host: &Host) -> anyhow::Result<usize> {
    let due = host
        .timers
        .take_due(Utc::now().timestamp_millis())
        .await
        .context("cannot read timers")?;

    let mut executed = 0;
    for timer in due {
        match host.scheduler.timer_fired(timer.clone()).await {
            Ok(FireOutcome::Executed { rescheduled_as }) => {
                executed += 1;
                tracing::info!(timer_id = %timer, ?rescheduled_as, "action executed");
            }
            Ok(outcome) => tracing::debug!(timer_id = %timer, ?outcome, "timer ignored"),
            // The action is still stored; the next startup sweep retries it.
            Err(e) => tracing::warn!(timer_id = %timer, error = %e, "timer handling failed"),
        }
    }
    Ok(executed)
}
