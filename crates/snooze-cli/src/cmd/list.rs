use chrono::Utc;
use snooze_core::action::ScheduledAction;

use crate::host::Host;
use crate::output::{describe_repeat, format_wake, print_json, print_table, time_left, truncate};

pub async fn run(host: &Host, json: bool) -> anyhow::Result<()> {
    let actions = host.scheduler.list().await?;

    if json {
        print_json(&actions)?;
        return Ok(());
    }
    if actions.is_empty() {
        println!("Nothing scheduled.");
        return Ok(());
    }
    print_table(
        &["ID", "WAKE", "WHEN", "REPEAT", "TITLE"],
        rows(&actions, Utc::now().timestamp_millis()),
    );
    Ok(())
}

fn rows(actions: &[ScheduledAction], now_ms: i64) -> Vec<Vec<String>> {
    actions
        .iter()
        .map(|a| {
            let mut title = truncate(a.payload.display_title(), 60);
            if a.payload.note.is_some() {
                title.push_str(" *");
            }
            vec![
                a.id.to_string(),
                format_wake(a.wake_time),
                time_left(a.wake_time, now_ms),
                describe_repeat(a),
                title,
            ]
        })
        .collect()
}
