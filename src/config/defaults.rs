//! Default configuration values
//!
//! All constants used throughout the config module are defined here.

/// Application data directory, relative to the home directory
pub const APP_DIR_NAME: &str = ".chat-stream";

/// Default database location (tilde-expanded at load time)
pub const DEFAULT_DB_PATH: &str = "~/.chat-stream/db/conversations.sqlite";

/// Trailing debounce window for render cycles
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;

/// Longest a pending render may be deferred during a continuous burst
pub const DEFAULT_MAX_WAIT_MS: u64 = 600;

/// Conversations shown by `list` and loaded at startup
pub const DEFAULT_RECENT_LIMIT: usize = 20;

/// Model used when none is configured or requested
pub const DEFAULT_MODEL_ID: &str = "claude-3-5-sonnet";

/// Models that show a thinking indicator before their first chunk
pub const DEFAULT_THINKING_MODELS: &[&str] = &["o1", "o1-mini", "o3-mini"];

/// Generated titles are truncated to this many characters
pub const DEFAULT_TITLE_MAX_CHARS: usize = 50;

/// Deepest element nesting the Markdown compiler accepts
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;
