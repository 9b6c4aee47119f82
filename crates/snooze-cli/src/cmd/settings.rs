use anyhow::{bail, Context};
use clap::Subcommand;
use snooze_core::config::{ConfigWarning, WarnLevel};
use snooze_core::kv::KvStore;

use crate::host::Host;
use crate::output::print_json;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand, Debug)]
pub enum SettingsSubcommand {
    /// Show the current settings
    Show,

    /// Change one setting
    Set {
        /// weekStartDay, weekendStartDay, dayStart, dayEnd,
        /// executeInBackground, or laterHours
        key: String,
        value: String,
    },

    /// Check settings and config.yaml for mistakes
    Check,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run(host: &Host, subcmd: SettingsSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        SettingsSubcommand::Show => show(host, json).await,
        SettingsSubcommand::Set { key, value } => set(host, &key, &value, json).await,
        SettingsSubcommand::Check => check(host, json).await,
    }
}

async fn show(host: &Host, json: bool) -> anyhow::Result<()> {
    let settings = host.settings().await?;
    if json {
        return print_json(&serde_json::json!({
            "settings": settings,
            "host": host.config,
        }));
    }
    println!("weekStartDay:        {}", settings.week_start_day);
    println!("weekendStartDay:     {}", settings.weekend_start_day);
    println!("dayStart:            {}", settings.day_start);
    println!("dayEnd:              {}", settings.day_end);
    println!("executeInBackground: {}", settings.execute_in_background);
    println!("laterHours:          {}", settings.later_hours);
    println!();
    println!("tickMs:   {}", host.config.tick_ms);
    println!("executor: {:?}", host.config.executor);
    if let Some(launcher) = &host.config.launcher {
        println!("launcher: {launcher}");
    }
    Ok(())
}

async fn set(host: &Host, key: &str, value: &str, json: bool) -> anyhow::Result<()> {
    let mut settings = host.settings().await?;
    if let Err(msg) = settings.set_field(key, value) {
        bail!("{msg}");
    }
    settings
        .save(host.kv.as_ref() as &dyn KvStore)
        .await
        .context("failed to save settings")?;

    if json {
        print_json(&settings)?;
    } else {
        println!("Set {key} = {value}");
    }
    for w in settings.validate() {
        eprintln!("[{}] {}", prefix(&w), w.message);
    }
    Ok(())
}

async fn check(host: &Host, json: bool) -> anyhow::Result<()> {
    let mut warnings = host.settings().await?.validate();
    warnings.extend(host.config.validate());

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Settings are valid. No warnings.");
    } else {
        for w in &warnings {
            println!("[{}] {}", prefix(w), w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        bail!("settings check found errors");
    }
    Ok(())
}

fn prefix(w: &ConfigWarning) -> &'static str {
    match w.level {
        WarnLevel::Warning => "warning",
        WarnLevel::Error => "error",
    }
}
