use anyhow::{bail, Context};
use chrono::Local;
use clap::Args;
use snooze_core::action::{ActionEdit, ActionId};

use crate::cmd::add::print_scheduled;
use crate::cmd::args::{RuleArgs, WhenArgs};
use crate::host::Host;
use crate::output::print_json;

#[derive(Args, Debug)]
pub struct EditArgs {
    pub id: ActionId,

    #[command(flatten)]
    pub when: WhenArgs,

    #[command(flatten)]
    pub rule: RuleArgs,

    /// New display title ('' clears it)
    #[arg(long)]
    pub title: Option<String>,

    /// New note ('' clears it)
    #[arg(long)]
    pub note: Option<String>,
}

pub async fn run(host: &Host, args: EditArgs, json: bool) -> anyhow::Result<()> {
    let settings = host.settings().await?;
    let now = Local::now();

    let edit = ActionEdit {
        wake_time: args
            .when
            .resolve(&settings, &now)?
            .map(|w| w.timestamp_millis()),
        custom_title: args.title,
        note: args.note,
        recurrence: args.rule.to_rule(&settings, &now)?,
    };
    if edit == ActionEdit::default() {
        bail!("nothing to change: pass --at/--in/--preset, --every, --title, or --note");
    }

    let id = args.id;
    let action = host
        .scheduler
        .update(id, edit)
        .await
        .with_context(|| format!("cannot edit action {id}"))?;

    if json {
        print_json(&action)?;
    } else {
        print_scheduled(&action);
    }
    Ok(())
}
