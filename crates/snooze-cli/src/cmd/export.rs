use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use snooze_core::io::atomic_write;
use snooze_core::paths::export_file_name;
use snooze_core::store::ExportEnvelope;

use crate::host::Host;

/// Write every pending action as an export envelope.
///
/// `out` may be a file or a directory; a directory gets a timestamped file
/// name. Without `out` the envelope goes to stdout.
pub async fn run(host: &Host, out: Option<PathBuf>) -> anyhow::Result<()> {
    let actions = host.scheduler.list().await?;
    let now = Utc::now();
    let count = actions.len();
    let envelope = ExportEnvelope::new(actions, now.timestamp_millis());
    let text = serde_json::to_string_pretty(&envelope)?;

    let Some(out) = out else {
        println!("{text}");
        return Ok(());
    };
    let path = if out.is_dir() {
        out.join(export_file_name(now))
    } else {
        out
    };
    atomic_write(&path, text.as_bytes())
        .with_context(|| format!("cannot write {}", path.display()))?;
    eprintln!("Exported {count} action(s) to {}", path.display());
    Ok(())
}
