use std::path::Path;

use anyhow::Context;
use snooze_core::store::{parse_import, ImportMode};

use crate::host::Host;
use crate::output::print_json;

pub async fn run(host: &Host, file: &Path, merge: bool, json: bool) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let parsed = parse_import(&text).with_context(|| format!("cannot import {}", file.display()))?;

    let (mode, mode_name) = if merge {
        (ImportMode::Merge, "merge")
    } else {
        (ImportMode::Replace, "replace")
    };
    let imported = host
        .scheduler
        .import(parsed.actions, mode)
        .await
        .context("import failed")?;

    if json {
        print_json(&serde_json::json!({
            "mode": mode_name,
            "imported": imported.len(),
            "skipped": parsed.skipped,
        }))?;
        return Ok(());
    }
    println!("Imported {} action(s)", imported.len());
    if parsed.skipped > 0 {
        println!("Skipped {} malformed entries", parsed.skipped);
    }
    Ok(())
}
