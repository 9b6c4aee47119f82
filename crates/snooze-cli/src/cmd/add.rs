use anyhow::{bail, Context};
use chrono::{Local, Utc};
use clap::Args;
use snooze_core::action::{ActionDraft, Payload, ScheduledAction};

use crate::cmd::args::{RuleArgs, WhenArgs};
use crate::host::Host;
use crate::output::{describe_repeat, format_wake, print_json, time_left};

#[derive(Args, Debug)]
pub struct AddArgs {
    /// URL to reopen
    pub url: String,

    #[command(flatten)]
    pub when: WhenArgs,

    #[command(flatten)]
    pub rule: RuleArgs,

    /// Title to show instead of the URL
    #[arg(long)]
    pub title: Option<String>,

    /// Free-text note (up to 300 characters)
    #[arg(long)]
    pub note: Option<String>,
}

pub async fn run(host: &Host, args: AddArgs, json: bool) -> anyhow::Result<()> {
    let settings = host.settings().await?;
    let now = Local::now();

    let wake = args.when.resolve(&settings, &now)?;
    let rule = args.rule.to_rule(&settings, &now)?;
    if wake.is_none() && rule.is_none() {
        bail!("say when: pass --at, --in, --preset, or --every");
    }

    let mut payload = Payload::for_url(args.url.trim());
    payload.custom_title = args.title;
    payload.note = args.note;

    let draft = ActionDraft {
        payload,
        wake_time: wake.map(|w| w.timestamp_millis()),
        recurrence: rule,
    };
    let action = host
        .scheduler
        .schedule(draft)
        .await
        .context("failed to schedule action")?;

    if json {
        print_json(&action)?;
    } else {
        print_scheduled(&action);
    }
    Ok(())
}

pub fn print_scheduled(action: &ScheduledAction) {
    println!(
        "Scheduled [{}] {} for {} ({}, {})",
        action.id,
        action.payload.display_title(),
        format_wake(action.wake_time),
        time_left(action.wake_time, Utc::now().timestamp_millis()),
        describe_repeat(action),
    );
}
