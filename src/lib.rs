//! chat-stream - streaming chat client core
//!
//! This library turns incremental model output into live, sanitized Markdown
//! and persists the resulting conversations.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── markdown/  - Sanitizing Markdown compiler (pulldown-cmark + syntect)
//! ├── dom/       - Node trees, diff/patch, live container with selection
//! ├── render/    - Debounced stream renderer
//! ├── chat/      - Message model, streaming sources, session state machine
//! ├── storage/   - SQLite conversation/message store
//! ├── config/    - User configuration (~/.chat-stream/config.json)
//! ├── error.rs   - Error taxonomy and logging helpers
//! └── logging.rs - JSONL file + stderr tracing setup
//! ```

pub mod chat;
pub mod config;
pub mod dom;
pub mod error;
pub mod logging;
pub mod markdown;
pub mod render;
pub mod storage;

pub use chat::{
    ChatSession, Conversation, ConversationId, ExchangeState, Message, MessageId, MessageRole,
    ModelInfo, Settlement, StreamIndicator,
};
pub use error::{ChatError, TransportError};
pub use storage::{ConversationStore, SqliteStore};
