//! Snapshot persistence for the task store.
//!
//! The whole collection is serialized as one JSON array and written under a
//! fixed key on every mutation; it is read back once when the store opens.
//! There is no append log and no schema version field: older snapshots are
//! migrated field-by-field by the `Task` deserializer.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::storage::{validate_key, KeyValueStore};
use crate::task::Task;

/// Key the snapshot is stored under unless configured otherwise
pub const DEFAULT_STORAGE_KEY: &str = "todos";

/// Load/save contract between the task store and durable state.
pub trait Persistence {
    /// Restore the collection. Absent state is an empty collection.
    fn load(&mut self) -> Result<Vec<Task>>;

    /// Overwrite durable state with `tasks`.
    fn save(&mut self, tasks: &[Task]) -> Result<()>;
}

/// Details about a snapshot that could not be parsed on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovery {
    pub reason: String,
    /// Where the unparsable value was copied, if the copy succeeded
    pub backup_key: Option<String>,
}

/// Whole-collection JSON snapshot in a single key-value slot.
#[derive(Debug, Clone)]
pub struct SnapshotPersistence<S: KeyValueStore> {
    storage: S,
    key: String,
    recovery: Option<Recovery>,
}

impl<S: KeyValueStore> SnapshotPersistence<S> {
    pub fn new(storage: S, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        validate_key(&key)?;
        Ok(Self {
            storage,
            key,
            recovery: None,
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Set when the last `load` found unparsable state and started empty.
    pub fn recovery(&self) -> Option<&Recovery> {
        self.recovery.as_ref()
    }

    fn back_up_corrupt(&mut self, raw: &[u8]) -> Option<String> {
        let backup_key = format!(
            "{}.corrupt-{}",
            self.key,
            Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
        );
        match self.storage.set_bytes(&backup_key, raw) {
            Ok(()) => Some(backup_key),
            Err(err) => {
                warn!(error = %err, key = %backup_key, "could not back up unparsable snapshot");
                None
            }
        }
    }
}

impl<S: KeyValueStore> Persistence for SnapshotPersistence<S> {
    fn load(&mut self) -> Result<Vec<Task>> {
        self.recovery = None;
        let Some(raw) = self.storage.get_bytes(&self.key)? else {
            debug!(key = %self.key, "no snapshot; starting empty");
            return Ok(Vec::new());
        };

        let decoded = match std::str::from_utf8(&raw) {
            Ok(text) => decode_snapshot(text).map_err(|err| err.to_string()),
            Err(err) => Err(format!("snapshot is not valid UTF-8: {err}")),
        };

        match decoded {
            Ok(tasks) => {
                debug!(key = %self.key, tasks = tasks.len(), "snapshot loaded");
                Ok(tasks)
            }
            Err(reason) => {
                let backup_key = self.back_up_corrupt(&raw);
                warn!(
                    key = %self.key,
                    backup = backup_key.as_deref().unwrap_or("-"),
                    error = %reason,
                    "unparsable snapshot; starting empty"
                );
                self.recovery = Some(Recovery { reason, backup_key });
                Ok(Vec::new())
            }
        }
    }

    fn save(&mut self, tasks: &[Task]) -> Result<()> {
        let encoded = encode_snapshot(tasks)?;
        self.storage.set(&self.key, &encoded)?;
        debug!(key = %self.key, tasks = tasks.len(), bytes = encoded.len(), "snapshot saved");
        Ok(())
    }
}

/// Serialize a collection into the on-disk snapshot format.
pub fn encode_snapshot(tasks: &[Task]) -> Result<String> {
    Ok(serde_json::to_string(tasks)?)
}

/// Parse a stored snapshot.
///
/// Blank input is an empty collection. Records repeating an earlier id are
/// dropped so ids stay unique in memory.
pub fn decode_snapshot(raw: &str) -> Result<Vec<Task>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let tasks: Vec<Task> = serde_json::from_str(raw)?;
    let mut seen = HashSet::with_capacity(tasks.len());
    let total = tasks.len();
    let unique: Vec<Task> = tasks
        .into_iter()
        .filter(|task| seen.insert(task.id.clone()))
        .collect();
    if unique.len() != total {
        warn!(dropped = total - unique.len(), "snapshot contained duplicate task ids");
    }
    Ok(unique)
}
