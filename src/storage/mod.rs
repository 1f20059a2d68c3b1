//! Conversation Storage
//!
//! The session talks to storage only through `ConversationStore`, so tests
//! can substitute a failing or in-memory store. `SqliteStore` is the
//! durable implementation.

mod sqlite;

pub use sqlite::SqliteStore;

use anyhow::Result;

use crate::chat::model::{Conversation, ConversationId, Message, MessageId};

/// Durable conversation/message storage
pub trait ConversationStore: Send + Sync {
    /// Insert a conversation. Inserting an existing id is a no-op.
    fn create_conversation(&self, conversation: &Conversation) -> Result<ConversationId>;

    /// Insert or update a message by id and bump its conversation's `updated_at`
    fn add_message(&self, message: &Message) -> Result<MessageId>;

    /// Most recent conversations, pinned first, each group by `updated_at` descending
    fn list_recent(&self, limit: usize) -> Result<Vec<Conversation>>;

    fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>>;

    /// Messages of a conversation in creation order
    fn get_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>>;

    /// Delete a conversation and its messages. Returns whether it existed.
    fn delete_conversation(&self, id: &ConversationId) -> Result<bool>;

    fn update_title(&self, id: &ConversationId, title: &str) -> Result<()>;

    fn update_pin(&self, id: &ConversationId, pinned: bool) -> Result<()>;

    /// Case-insensitive match on title or message content
    fn search_conversations(&self, query: &str, limit: usize) -> Result<Vec<Conversation>>;
}
