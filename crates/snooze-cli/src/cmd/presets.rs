use chrono::Local;
use snooze_core::presets::Preset;

use crate::host::Host;
use crate::output::{format_local, print_json, print_table};

/// Show each preset with the wake time it would resolve to right now.
pub async fn run(host: &Host, json: bool) -> anyhow::Result<()> {
    let settings = host.settings().await?;
    let now = Local::now();

    let mut resolved = Vec::new();
    for preset in Preset::all() {
        let wake = preset.wake_time(&settings, &now)?;
        resolved.push((*preset, preset.label(&settings), wake));
    }

    if json {
        let items: Vec<_> = resolved
            .iter()
            .map(|(preset, label, wake)| {
                serde_json::json!({
                    "name": preset,
                    "label": label,
                    "wakeTime": wake.timestamp_millis(),
                })
            })
            .collect();
        print_json(&items)?;
        return Ok(());
    }

    print_table(
        &["NAME", "LABEL", "WAKES"],
        resolved
            .iter()
            .map(|(preset, label, wake)| {
                vec![preset.to_string(), label.clone(), format_local(wake)]
            })
            .collect(),
    );
    Ok(())
}
