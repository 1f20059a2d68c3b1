use thiserror::Error;
use tracing::{debug, error};

/// Failure reported by a streaming source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("stream timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("provider error: {0}")]
    Provider(String),
}

impl From<&str> for TransportError {
    fn from(message: &str) -> Self {
        match message {
            "timeout" => TransportError::Timeout,
            other => TransportError::Provider(other.to_string()),
        }
    }
}

/// Domain errors for the chat core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Streaming failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage operation failed: {0}")]
    Persistence(String),

    #[error("An exchange is already in progress")]
    Busy,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Message {0} was already saved")]
    ConcurrencyViolation(String),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
}

impl ChatError {
    /// Wrap a storage failure, keeping the full context chain
    pub fn persistence(err: anyhow::Error) -> Self {
        ChatError::Persistence(format!("{:#}", err))
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(TransportError::Timeout) => {
                "The model took too long to respond.".to_string()
            }
            Self::Transport(e) => format!("The response could not be completed: {}", e),
            Self::Persistence(_) => "Your chat could not be saved.".to_string(),
            Self::Busy => "Wait for the current reply to finish.".to_string(),
            Self::EmptyMessage => "Type a message first.".to_string(),
            Self::ConcurrencyViolation(_) => String::new(),
            Self::ConversationNotFound(id) => format!("Conversation {} no longer exists.", id),
        }
    }
}

/// Extension trait for silent error logging with caller location tracking.
/// Use when the operation is recoverable and the user doesn't need to know.
///
/// ```ignore
/// use chat_stream::error::ResultExt;
///
/// // Keep chatting even if the write failed
/// store.add_message(&message).log_err();
/// ```
pub trait ResultExt<T> {
    /// Log error with caller location and return None. Use for recoverable failures.
    fn log_err(self) -> Option<T>;
    /// Log at debug level and return None. Use for suppressed conditions.
    fn debug_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn debug_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                debug!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation suppressed"
                );
                None
            }
        }
    }
}
