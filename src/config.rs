//! Configuration loading and management
//!
//! Handles parsing of `todos.toml` in the data directory.

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;
use crate::persist::DEFAULT_STORAGE_KEY;

/// Name of the configuration file inside the data directory
pub const CONFIG_FILE: &str = "todos.toml";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Key the task snapshot is stored under
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// How long to wait for the snapshot lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Input validation for new and edited tasks
    #[serde(default)]
    pub form: FormConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            lock_timeout_ms: default_lock_timeout_ms(),
            form: FormConfig::default(),
        }
    }
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

/// Form-level rules applied before a task reaches the store
#[derive(Debug, Clone, Deserialize)]
pub struct FormConfig {
    /// Category used when none is given
    #[serde(default = "default_category")]
    pub default_category: String,

    /// Category palette offered to the user
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    /// Reject categories outside the palette
    #[serde(default)]
    pub strict_categories: bool,

    /// Maximum title length in characters
    #[serde(default = "default_max_title_len")]
    pub max_title_len: usize,

    /// Maximum description length in characters
    #[serde(default = "default_max_description_len")]
    pub max_description_len: usize,
}

fn default_category() -> String {
    "personal".to_string()
}

fn default_categories() -> Vec<String> {
    ["personal", "work", "shopping", "health", "finance", "other"]
        .iter()
        .map(|category| category.to_string())
        .collect()
}

fn default_max_title_len() -> usize {
    100
}

fn default_max_description_len() -> usize {
    500
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            default_category: default_category(),
            categories: default_categories(),
            strict_categories: false,
            max_title_len: default_max_title_len(),
            max_description_len: default_max_description_len(),
        }
    }
}

impl Config {
    /// Load configuration from a `todos.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the data directory, or return defaults
    pub fn load_from_dir(data_dir: &Path) -> Self {
        let config_path = data_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        crate::storage::validate_key(&self.storage_key)
            .map_err(|err| Error::InvalidConfig(format!("storage_key: {err}")))?;
        if self.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "lock_timeout_ms must be > 0".to_string(),
            ));
        }
        self.form.validate()
    }
}

impl FormConfig {
    fn validate(&self) -> Result<()> {
        if self.default_category.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "form.default_category cannot be empty".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for category in &self.categories {
            let trimmed = category.trim();
            if trimmed.is_empty() {
                return Err(Error::InvalidConfig(
                    "form.categories cannot include empty entries".to_string(),
                ));
            }
            if !seen.insert(trimmed) {
                return Err(Error::InvalidConfig(format!(
                    "form.categories has duplicate entry '{trimmed}'"
                )));
            }
        }

        if self.strict_categories && !seen.contains(self.default_category.trim()) {
            return Err(Error::InvalidConfig(format!(
                "form.default_category '{}' not in form.categories",
                self.default_category
            )));
        }

        if self.max_title_len == 0 {
            return Err(Error::InvalidConfig(
                "form.max_title_len must be > 0".to_string(),
            ));
        }
        if self.max_description_len == 0 {
            return Err(Error::InvalidConfig(
                "form.max_description_len must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
