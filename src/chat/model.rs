//! Chat Data Models
//!
//! Core data structures shared by the session state machine and the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    /// Create a new random ConversationId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a ConversationId from a UUID string
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the UUID as a string
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user
    User,
    /// Message from the model
    Assistant,
}

impl MessageRole {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    /// Parse from string (fallible, returns Option)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageRole::parse(s).ok_or_else(|| format!("Invalid message role: {}", s))
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Model metadata consumed by the chat core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Identifier sent to the provider (e.g., "gpt-4o")
    pub id: String,
    /// Human-readable display name
    pub display_name: String,
    /// Whether the model emits a thinking phase before its first token
    #[serde(default)]
    pub supports_thinking: bool,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            supports_thinking: false,
        }
    }

    /// Mark the model as one that thinks before answering
    pub fn with_thinking(mut self, supports_thinking: bool) -> Self {
        self.supports_thinking = supports_thinking;
        self
    }
}

/// A conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier
    pub id: ConversationId,

    /// Title, empty until generated from the first message
    pub title: String,

    /// When the conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added (or metadata changed)
    pub updated_at: DateTime<Utc>,

    /// Pinned conversations sort before all others
    pub is_pinned: bool,

    /// Model the conversation was started with
    pub model_id: String,
}

impl Conversation {
    /// Create a new untitled conversation for the given model
    pub fn new(model_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            title: String::new(),
            created_at: now,
            updated_at: now,
            is_pinned: false,
            model_id: model_id.into(),
        }
    }

    /// Whether a title still has to be generated
    pub fn needs_title(&self) -> bool {
        self.title.trim().is_empty()
    }

    /// Update the timestamp to now
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Title for display, with a placeholder for untitled conversations
    pub fn display_title(&self) -> &str {
        if self.needs_title() {
            "New Chat"
        } else {
            &self.title
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier
    pub id: MessageId,

    /// The conversation this message belongs to
    pub conversation_id: ConversationId,

    /// Role of the message sender
    pub role: MessageRole,

    /// Message content (append-only while streaming)
    pub content: String,

    /// When the message was created
    pub created_at: DateTime<Utc>,

    /// Model that produced (or was asked to answer) this message
    pub model_id: String,

    /// True while chunks are still arriving
    #[serde(skip)]
    pub is_streaming: bool,

    /// Inline error text when the exchange failed
    #[serde(skip)]
    pub error: Option<String>,
}

impl Message {
    /// Create a new message
    pub fn new(
        conversation_id: ConversationId,
        role: MessageRole,
        content: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            conversation_id,
            role,
            content: content.into(),
            created_at: Utc::now(),
            model_id: model_id.into(),
            is_streaming: false,
            error: None,
        }
    }

    /// Create a user message
    pub fn user(
        conversation_id: ConversationId,
        content: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self::new(conversation_id, MessageRole::User, content, model_id)
    }

    /// Create an empty assistant message that is still streaming
    pub fn assistant_placeholder(
        conversation_id: ConversationId,
        model_id: impl Into<String>,
    ) -> Self {
        let mut message = Self::new(conversation_id, MessageRole::Assistant, "", model_id);
        message.is_streaming = true;
        message
    }

    /// Copy of this message with `chunk` appended
    pub fn with_appended(&self, chunk: &str) -> Self {
        let mut next = self.clone();
        next.content.push_str(chunk);
        next
    }

    /// Copy of this message with streaming cleared
    pub fn settled(&self) -> Self {
        let mut next = self.clone();
        next.is_streaming = false;
        next
    }

    /// Copy of this message marked as failed
    pub fn failed(&self, error: impl Into<String>) -> Self {
        let mut next = self.settled();
        next.error = Some(error.into());
        next
    }
}
