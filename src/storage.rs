//! Key-value slots backing the task snapshot
//!
//! A slot is a value stored under a short key. The file backend keeps
//! one JSON file per key inside the data directory:
//!
//! ```text
//! <data dir>/
//!   todos.toml                       # Configuration (see `config`)
//!   todos.json                       # Task snapshot slot (default key)
//!   todos.json.lock                  # Lock guarding the slot
//!   todos.corrupt-<timestamp>.json   # Unparsable snapshot kept on load
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};

/// Extension used for slot files
const SLOT_EXTENSION: &str = "json";

/// A string-keyed store of values
///
/// Backends hold raw bytes so a slot that is not valid UTF-8 can still be
/// read and copied aside; `get`/`set` are the text view over them.
pub trait KeyValueStore {
    /// Read the raw value stored under `key`, if any
    fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Overwrite the raw value stored under `key`
    fn set_bytes(&mut self, key: &str, value: &[u8]) -> Result<()>;

    /// Read the value stored under `key` as text
    fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(data) = self.get_bytes(key)? else {
            return Ok(None);
        };
        String::from_utf8(data).map(Some).map_err(|err| {
            Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
        })
    }

    /// Overwrite the value stored under `key`
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_bytes(key, value.as_bytes())
    }
}

/// Validate a slot key
///
/// Keys become file names, so they are limited to `[A-Za-z0-9._-]` and may
/// not start with a dot.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidArgument("storage key cannot be empty".to_string()));
    }
    if key.starts_with('.') {
        return Err(Error::InvalidArgument(format!(
            "storage key '{key}' cannot start with '.'"
        )));
    }
    if !key
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'))
    {
        return Err(Error::InvalidArgument(format!(
            "storage key '{key}' may only contain letters, digits, '.', '_' or '-'"
        )));
    }
    Ok(())
}

/// File-backed slots: `<root>/<key>.json`, written atomically under a lock
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    lock_timeout_ms: u64,
}

impl FileStorage {
    /// Create a file storage rooted at `root` (created lazily on first write)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    /// Directory holding the slot files
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `key`
    pub fn slot_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{SLOT_EXTENSION}"))
    }
}

impl KeyValueStore for FileStorage {
    fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        lock::read_locked(self.slot_path(key), self.lock_timeout_ms)
    }

    fn set_bytes(&mut self, key: &str, value: &[u8]) -> Result<()> {
        validate_key(key)?;
        fs::create_dir_all(&self.root)?;
        lock::write_atomic_locked(self.slot_path(key), value, self.lock_timeout_ms)
    }
}

/// In-memory slots; nothing survives the process
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slots: HashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a slot directly, bypassing key validation
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.slots.insert(key.into(), value.into());
        self
    }

    /// Keys currently holding a value, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.slots.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.slots.get(key).cloned())
    }

    fn set_bytes(&mut self, key: &str, value: &[u8]) -> Result<()> {
        validate_key(key)?;
        self.slots.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
