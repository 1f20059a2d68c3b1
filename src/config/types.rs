//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::defaults::*;
use crate::chat::ModelInfo;

/// User configuration, read from `~/.chat-stream/config.json`.
///
/// Every field is optional; getters fall back to the constants in
/// `defaults`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// SQLite database file (supports `~`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
    /// Render debounce window in milliseconds (default: 150)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
    /// Max render deferral during bursts in milliseconds (default: 600)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wait_ms: Option<u64>,
    /// Number of recent conversations to list (default: 20)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_limit: Option<usize>,
    /// Model id used for new conversations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    /// Model ids that support a thinking phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_models: Option<Vec<String>>,
    /// Max characters of a generated title (default: 50)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_max_chars: Option<usize>,
    /// Max Markdown nesting depth before literal fallback (default: 64)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nesting_depth: Option<usize>,
}

impl Config {
    /// Returns the database path with `~` expanded
    pub fn get_db_path(&self) -> PathBuf {
        let raw = self.db_path.as_deref().unwrap_or(DEFAULT_DB_PATH);
        PathBuf::from(shellexpand::tilde(raw).as_ref())
    }

    pub fn get_debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS))
    }

    /// Returns the max-wait bound; never shorter than the debounce window
    pub fn get_max_wait(&self) -> Duration {
        let max_wait = Duration::from_millis(self.max_wait_ms.unwrap_or(DEFAULT_MAX_WAIT_MS));
        max_wait.max(self.get_debounce())
    }

    pub fn get_recent_limit(&self) -> usize {
        self.recent_limit.unwrap_or(DEFAULT_RECENT_LIMIT)
    }

    pub fn get_default_model(&self) -> String {
        self.default_model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string())
    }

    pub fn get_thinking_models(&self) -> Vec<String> {
        self.thinking_models.clone().unwrap_or_else(|| {
            DEFAULT_THINKING_MODELS
                .iter()
                .map(|s| s.to_string())
                .collect()
        })
    }

    pub fn get_title_max_chars(&self) -> usize {
        self.title_max_chars.unwrap_or(DEFAULT_TITLE_MAX_CHARS).max(1)
    }

    pub fn get_max_nesting_depth(&self) -> usize {
        self.max_nesting_depth
            .unwrap_or(DEFAULT_MAX_NESTING_DEPTH)
            .max(1)
    }

    /// Resolve a model id into the metadata the chat core consumes
    pub fn model_info(&self, id: Option<&str>) -> ModelInfo {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| self.get_default_model());
        let thinking = self.get_thinking_models().iter().any(|m| *m == id);
        ModelInfo::new(id.clone(), id).with_thinking(thinking)
    }
}
