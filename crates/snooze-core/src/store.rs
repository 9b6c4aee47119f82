//! Action store: the persisted list of pending actions.
//!
//! There is no partial-update API. Callers read the whole list, compute a new
//! whole list, and write it back in one `set`. Every mutation runs inside the
//! trigger queue.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::action::{IdAllocator, ScheduledAction};
use crate::error::{Result, SnoozeError};
use crate::kv::KvStore;

pub const ACTIONS_KEY: &str = "scheduledActions";
/// Key used by the browser build; read when the primary key is absent.
pub const LEGACY_ACTIONS_KEY: &str = "snoozedTabs";

// ---------------------------------------------------------------------------
// ActionStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ActionStore {
    kv: Arc<dyn KvStore>,
}

impl std::fmt::Debug for ActionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionStore").finish_non_exhaustive()
    }
}

impl ActionStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// The full list, `[]` when nothing has been stored yet.
    pub async fn load_all(&self) -> Result<Vec<ScheduledAction>> {
        let raw = match self.kv.get(ACTIONS_KEY).await? {
            Some(v) => v,
            None => match self.kv.get(LEGACY_ACTIONS_KEY).await? {
                Some(v) => v,
                None => return Ok(Vec::new()),
            },
        };
        if raw.is_null() {
            return Ok(Vec::new());
        }
        let actions = serde_json::from_value(raw)?;
        Ok(actions)
    }

    /// Replace the whole collection in a single write.
    pub async fn save_all(&self, actions: &[ScheduledAction]) -> Result<()> {
        let value = serde_json::to_value(actions)?;
        self.kv.set(ACTIONS_KEY, value).await
    }
}

// ---------------------------------------------------------------------------
// Import / export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// The imported list becomes the whole list.
    Replace,
    /// Imported entries are appended; colliding ids are renumbered.
    Merge,
}

/// File format written by `export`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub exported_with_version: String,
    pub exported_at: i64,
    #[serde(alias = "snoozedTabs")]
    pub actions: Vec<ScheduledAction>,
}

impl ExportEnvelope {
    pub fn new(actions: Vec<ScheduledAction>, exported_at: i64) -> Self {
        Self {
            exported_with_version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at,
            actions,
        }
    }
}

/// Entries accepted from an import file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedImport {
    pub actions: Vec<ScheduledAction>,
    /// Entries dropped because they lacked a numeric `id` / `wakeTime` or
    /// otherwise failed to decode.
    pub skipped: usize,
}

/// Parse an export envelope or a bare JSON array of actions.
pub fn parse_import(text: &str) -> Result<ParsedImport> {
    let parsed: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| SnoozeError::InvalidImport(format!("invalid JSON: {e}")))?;

    let items = match parsed {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut obj) => {
            match obj.remove("actions").or_else(|| obj.remove("snoozedTabs")) {
                Some(serde_json::Value::Array(items)) => items,
                _ => {
                    return Err(SnoozeError::InvalidImport(
                        "expected an export envelope or an array of actions".into(),
                    ))
                }
            }
        }
        _ => {
            return Err(SnoozeError::InvalidImport(
                "expected an export envelope or an array of actions".into(),
            ))
        }
    };

    let total = items.len();
    let actions: Vec<ScheduledAction> = items
        .into_iter()
        .filter(|item| item.get("id").is_some_and(|v| v.is_i64()))
        .filter(|item| item.get("wakeTime").is_some_and(|v| v.is_i64()))
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();

    if actions.is_empty() {
        return Err(SnoozeError::InvalidImport(
            "no valid actions found in the file".into(),
        ));
    }

    Ok(ParsedImport {
        skipped: total - actions.len(),
        actions,
    })
}

/// Append `incoming` to `existing`, renumbering any incoming id that collides
/// with an id already present (including ids renumbered earlier in the batch).
///
/// Returns the merged list and the adjusted incoming entries.
pub fn merge_import(
    existing: Vec<ScheduledAction>,
    incoming: Vec<ScheduledAction>,
    now_ms: i64,
) -> (Vec<ScheduledAction>, Vec<ScheduledAction>) {
    let mut ids = IdAllocator::new(existing.iter().chain(incoming.iter()), now_ms);
    let mut taken: HashSet<_> = existing.iter().map(|a| a.id).collect();

    let adjusted: Vec<ScheduledAction> = incoming
        .into_iter()
        .map(|mut action| {
            if !taken.insert(action.id) {
                action.id = ids.mint();
                taken.insert(action.id);
            }
            action
        })
        .collect();

    let mut merged = existing;
    merged.extend(adjusted.iter().cloned());
    (merged, adjusted)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionId, Payload};
    use crate::kv::{MemoryKv, RedbKv};
    use serde_json::json;
    use tempfile::TempDir;

    fn action(id: i64, wake: i64) -> ScheduledAction {
        ScheduledAction::one_shot(ActionId(id), Payload::for_url(format!("https://e/{id}")), 0, wake)
    }

    fn sorted_ids(list: &[ScheduledAction]) -> Vec<i64> {
        let mut ids: Vec<i64> = list.iter().map(|a| a.id.0).collect();
        ids.sort_unstable();
        ids
    }

    #[tokio::test]
    async fn load_all_on_empty_store_is_empty() {
        let store = ActionStore::new(Arc::new(MemoryKv::new()));
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = ActionStore::new(Arc::new(MemoryKv::new()));
        let list = vec![action(2, 20), action(1, 10)];
        store.save_all(&list).await.unwrap();
        assert_eq!(store.load_all().await.unwrap(), list);
    }

    #[tokio::test]
    async fn save_all_of_load_all_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let store = ActionStore::new(Arc::new(RedbKv::open(&dir.path().join("s.redb")).unwrap()));
        store.save_all(&[action(3, 30), action(1, 10), action(2, 20)]).await.unwrap();

        let before = store.load_all().await.unwrap();
        store.save_all(&before).await.unwrap();
        let after = store.load_all().await.unwrap();
        assert_eq!(sorted_ids(&before), sorted_ids(&after));
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn falls_back_to_legacy_key() {
        let kv = Arc::new(MemoryKv::new());
        kv.set(LEGACY_ACTIONS_KEY, json!([{ "id": 9, "url": "https://x", "wakeTime": 1 }]))
            .await
            .unwrap();
        let store = ActionStore::new(kv);
        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, ActionId(9));
    }

    #[tokio::test]
    async fn primary_key_wins_over_legacy_key() {
        let kv = Arc::new(MemoryKv::new());
        kv.set(LEGACY_ACTIONS_KEY, json!([{ "id": 9, "wakeTime": 1 }])).await.unwrap();
        kv.set(ACTIONS_KEY, json!([])).await.unwrap();
        let store = ActionStore::new(kv);
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[test]
    fn parse_import_accepts_envelope_and_bare_array() {
        let envelope = r#"{"exportedWithVersion":"1.0","exportedAt":1,"snoozedTabs":[{"id":1,"wakeTime":2}]}"#;
        assert_eq!(parse_import(envelope).unwrap().actions.len(), 1);

        let bare = r#"[{"id":1,"wakeTime":2},{"id":2,"wakeTime":3}]"#;
        assert_eq!(parse_import(bare).unwrap().actions.len(), 2);
    }

    #[test]
    fn parse_import_skips_entries_without_numeric_fields() {
        let text = r#"[{"id":1,"wakeTime":2},{"id":"x","wakeTime":2},{"id":3}]"#;
        let parsed = parse_import(text).unwrap();
        assert_eq!(parsed.actions.len(), 1);
        assert_eq!(parsed.skipped, 2);
    }

    #[test]
    fn parse_import_rejects_garbage() {
        assert!(matches!(parse_import("not json"), Err(SnoozeError::InvalidImport(_))));
        assert!(matches!(parse_import(r#"{"foo":1}"#), Err(SnoozeError::InvalidImport(_))));
        assert!(matches!(parse_import("[]"), Err(SnoozeError::InvalidImport(_))));
    }

    #[test]
    fn export_envelope_round_trips_through_parse_import() {
        let envelope = ExportEnvelope::new(vec![action(1, 10)], 99);
        let text = serde_json::to_string(&envelope).unwrap();
        let parsed = parse_import(&text).unwrap();
        assert_eq!(parsed.actions, envelope.actions);
        assert_eq!(parsed.skipped, 0);
    }

    #[test]
    fn merge_renumbers_collisions_only() {
        let existing = vec![action(1, 10), action(2, 20)];
        let incoming = vec![action(2, 200), action(3, 300)];
        let (merged, adjusted) = merge_import(existing, incoming, 0);

        assert_eq!(merged.len(), 4);
        assert_eq!(adjusted.len(), 2);
        assert_ne!(adjusted[0].id, ActionId(2), "colliding id must be renumbered");
        assert_eq!(adjusted[0].wake_time, 200);
        assert_eq!(adjusted[1].id, ActionId(3));

        let ids: HashSet<_> = merged.iter().map(|a| a.id).collect();
        assert_eq!(ids.len(), 4, "merged ids must be unique");
    }

    #[test]
    fn merge_renumbers_duplicates_within_the_batch() {
        let (merged, adjusted) = merge_import(vec![], vec![action(5, 1), action(5, 2)], 0);
        assert_eq!(merged.len(), 2);
        assert_ne!(adjusted[0].id, adjusted[1].id);
    }
}
