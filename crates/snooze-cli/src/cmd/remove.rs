use anyhow::Context;
use snooze_core::action::ActionId;

use crate::host::Host;
use crate::output::print_json;

pub async fn run(host: &Host, id: ActionId, json: bool) -> anyhow::Result<()> {
    let removed = host
        .scheduler
        .remove(id)
        .await
        .with_context(|| format!("cannot remove action {id}"))?;

    if json {
        print_json(&removed)?;
    } else {
        println!("Removed [{id}] {}", removed.payload.display_title());
    }
    Ok(())
}
