//! Chat
//!
//! Message model, streaming sources and the session state machine that ties
//! them to the conversation store.

pub mod model;
pub mod session;
pub mod source;
pub mod title;

pub use model::{Conversation, ConversationId, Message, MessageId, MessageRole, ModelInfo};
pub use session::{ChatSession, ExchangeHandle, ExchangeState, Settlement, StreamIndicator};
pub use source::{
    ProviderMessage, ScriptedOutcome, ScriptedSource, SessionEvent, StreamSink, StreamingSource,
};
pub use title::{HeuristicTitles, TitleGenerator};
