use anyhow::Context;
use snooze_core::action::ActionId;
use snooze_core::scheduler::FireOutcome;

use crate::host::Host;
use crate::output::print_json;

pub async fn run(host: &Host, id: ActionId, json: bool) -> anyhow::Result<()> {
    let outcome = host
        .scheduler
        .wake_now(id)
        .await
        .with_context(|| format!("cannot wake action {id}"))?;

    if json {
        print_json(&outcome)?;
        return Ok(());
    }
    match outcome {
        FireOutcome::Executed {
            rescheduled_as: Some(next),
        } => println!("Woke [{id}]; next occurrence is [{next}]"),
        FireOutcome::Executed { rescheduled_as: None } => println!("Woke [{id}]"),
        FireOutcome::Skipped { .. } => println!("Nothing to open for [{id}]; it was consumed"),
        FireOutcome::Stale | FireOutcome::Foreign => println!("Nothing to wake for [{id}]"),
    }
    Ok(())
}
