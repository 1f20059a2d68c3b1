//! Chat session state machine
//!
//! One `ChatSession` owns the visible conversation and drives exchanges:
//!
//! ```text
//! Idle -> AwaitingConversation -> Thinking | Typing -> Streaming -> Settled -> Idle
//! ```
//!
//! Streaming sources never touch the session directly. They report through
//! a `StreamSink`, and the session applies the resulting `SessionEvent`s in
//! channel order from `pump`/`wait_event`. Title generation runs on its own
//! thread and reports back on the same channel. Every message mutation is an
//! id-addressed replace, and events for anything but the active assistant
//! message are ignored, which makes late or duplicated events harmless.

use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use super::model::{Conversation, ConversationId, Message, MessageId, ModelInfo};
use super::source::{ProviderMessage, SessionEvent, StreamSink, StreamingSource};
use super::title::{HeuristicTitles, TitleGenerator};
use crate::error::{ChatError, ResultExt, TransportError};
use crate::storage::ConversationStore;

/// Display indicator for the pending assistant reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamIndicator {
    /// The model is reasoning; no text yet
    Thinking,
    /// Text is expected or arriving
    Typing,
}

/// How an exchange ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Completed,
    Errored,
}

/// Where the session is in the current exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    AwaitingConversation,
    Thinking,
    Typing,
    Streaming,
    /// Terminal transition; the session returns to `Idle` once the outcome
    /// has been recorded
    Settled(Settlement),
}

/// Ids involved in one accepted send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeHandle {
    pub conversation_id: ConversationId,
    pub user_message_id: MessageId,
    pub assistant_message_id: MessageId,
}

pub struct ChatSession {
    store: Arc<dyn ConversationStore>,
    source: Arc<dyn StreamingSource>,
    titles: Arc<dyn TitleGenerator>,
    sender: Sender<SessionEvent>,
    receiver: Receiver<SessionEvent>,
    conversation: Option<Conversation>,
    /// Whether the current conversation's row exists in the store
    conversation_stored: bool,
    /// Conversation with a title generation in flight
    titling: Option<ConversationId>,
    messages: Vec<Message>,
    state: ExchangeState,
    indicator: Option<StreamIndicator>,
    /// The assistant message currently streaming
    active: Option<MessageId>,
    /// Ids already written to the store
    saved: HashSet<MessageId>,
    last_settlement: Option<Settlement>,
    last_error: Option<ChatError>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("conversation", &self.conversation.as_ref().map(|c| c.id))
            .field("messages", &self.messages.len())
            .field("state", &self.state)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    pub fn new(store: Arc<dyn ConversationStore>, source: Arc<dyn StreamingSource>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            store,
            source,
            titles: Arc::new(HeuristicTitles::default()),
            sender,
            receiver,
            conversation: None,
            conversation_stored: false,
            titling: None,
            messages: Vec::new(),
            state: ExchangeState::Idle,
            indicator: None,
            active: None,
            saved: HashSet::new(),
            last_settlement: None,
            last_error: None,
        }
    }

    pub fn with_title_generator(mut self, titles: Arc<dyn TitleGenerator>) -> Self {
        self.titles = titles;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn indicator(&self) -> Option<StreamIndicator> {
        self.indicator
    }

    pub fn is_idle(&self) -> bool {
        self.state == ExchangeState::Idle
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }

    pub fn conversation_id(&self) -> Option<ConversationId> {
        self.conversation.as_ref().map(|c| c.id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn active_message_id(&self) -> Option<MessageId> {
        self.active
    }

    /// Content of the streaming assistant message, if any
    pub fn streaming_content(&self) -> Option<&str> {
        self.active
            .and_then(|id| self.message(id))
            .map(|m| m.content.as_str())
    }

    pub fn last_settlement(&self) -> Option<Settlement> {
        self.last_settlement
    }

    pub fn last_error(&self) -> Option<&ChatError> {
        self.last_error.as_ref()
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Start an exchange. Rejected unless the session is idle.
    #[instrument(skip(self, text), fields(model = %model.id, len = text.len()))]
    pub fn send_message(&mut self, text: &str, model: &ModelInfo) -> Result<ExchangeHandle, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if !self.is_idle() {
            debug!(state = ?self.state, "Rejecting send while an exchange is active");
            return Err(ChatError::Busy);
        }

        self.state = ExchangeState::AwaitingConversation;
        let conversation_id = self.resolve_conversation(model);

        let user = Message::user(conversation_id, text, &model.id);
        self.messages.push(user.clone());
        self.persist(&user);

        if self.conversation.as_ref().is_some_and(Conversation::needs_title) {
            self.request_title(conversation_id, text);
        }

        let placeholder = Message::assistant_placeholder(conversation_id, &model.id);
        let handle = ExchangeHandle {
            conversation_id,
            user_message_id: user.id,
            assistant_message_id: placeholder.id,
        };
        self.messages.push(placeholder);
        self.active = Some(handle.assistant_message_id);

        let indicator = if model.supports_thinking {
            StreamIndicator::Thinking
        } else {
            StreamIndicator::Typing
        };
        self.indicator = Some(indicator);
        self.state = match indicator {
            StreamIndicator::Thinking => ExchangeState::Thinking,
            StreamIndicator::Typing => ExchangeState::Typing,
        };

        info!(
            conversation_id = %conversation_id,
            message_id = %handle.assistant_message_id,
            indicator = ?indicator,
            "Exchange started"
        );

        let prior = self.provider_history();
        let sink = StreamSink::new(handle.assistant_message_id, self.sender.clone());
        self.source.start_completion(model, &prior, sink);

        Ok(handle)
    }

    /// The current conversation id, creating the conversation if needed.
    ///
    /// The id is stored in the session before any store call, so every
    /// later send reuses it even if persisting the conversation failed.
    fn resolve_conversation(&mut self, model: &ModelInfo) -> ConversationId {
        if let Some(conversation) = &self.conversation {
            return conversation.id;
        }

        let conversation = Conversation::new(&model.id);
        let id = conversation.id;
        self.conversation = Some(conversation);
        self.conversation_stored = false;
        self.ensure_conversation_stored();
        id
    }

    /// Insert the current conversation unless its row is known to exist.
    ///
    /// A failed insert is retried before every later save with the same id.
    fn ensure_conversation_stored(&mut self) -> bool {
        if self.conversation_stored {
            return true;
        }
        let Some(conversation) = self.conversation.as_ref() else {
            return false;
        };

        match self.store.create_conversation(conversation) {
            Ok(id) => {
                info!(conversation_id = %id, "Conversation created");
                self.conversation_stored = true;
                true
            }
            Err(e) => {
                let err = ChatError::persistence(e);
                error!(conversation_id = %conversation.id, error = %err, "Failed to persist conversation");
                self.last_error = Some(err);
                false
            }
        }
    }

    /// Completed, non-empty messages in provider form
    fn provider_history(&self) -> Vec<ProviderMessage> {
        self.messages
            .iter()
            .filter(|m| !m.is_streaming && m.error.is_none() && !m.content.is_empty())
            .map(|m| ProviderMessage::new(m.role, m.content.clone()))
            .collect()
    }

    /// Generate a title on a background thread; the result arrives as
    /// `SessionEvent::TitleReady`
    fn request_title(&mut self, conversation_id: ConversationId, seed: &str) {
        if self.titling == Some(conversation_id) {
            return;
        }

        let titles = Arc::clone(&self.titles);
        let sender = self.sender.clone();
        let seed = seed.to_string();
        let spawned = thread::Builder::new()
            .name("title-generator".into())
            .spawn(move || {
                let title = titles.generate(&seed);
                if title.is_empty() {
                    return;
                }
                // Fails only once the session is gone
                sender
                    .send(SessionEvent::TitleReady {
                        conversation_id,
                        title,
                    })
                    .debug_on_err();
            });

        match spawned {
            Ok(_) => self.titling = Some(conversation_id),
            Err(e) => warn!(error = %e, "Failed to spawn title generator"),
        }
    }

    // ========================================================================
    // Event handling
    // ========================================================================

    /// Apply every queued event. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while self.pump_one() {
            handled += 1;
        }
        handled
    }

    /// Apply the next queued event, if any
    pub fn pump_one(&mut self) -> bool {
        match self.receiver.try_recv() {
            Ok(event) => {
                self.handle_event(event);
                true
            }
            Err(_) => false,
        }
    }

    /// Block up to `timeout` for one event and apply it
    pub fn wait_event(&mut self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => {
                self.handle_event(event);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Chunk { message_id, text } => self.on_chunk(message_id, &text),
            SessionEvent::Complete { message_id } => self.on_complete(message_id),
            SessionEvent::Error { message_id, error } => self.on_error(message_id, error),
            SessionEvent::TitleReady {
                conversation_id,
                title,
            } => self.on_title_ready(conversation_id, &title),
        }
    }

    fn is_active(&self, id: MessageId) -> bool {
        self.active == Some(id)
    }

    fn on_chunk(&mut self, id: MessageId, text: &str) {
        if !self.is_active(id) {
            debug!(message_id = %id, "Ignoring chunk for inactive message");
            return;
        }
        let updated = self.update_message(id, |m| m.is_streaming.then(|| m.with_appended(text)));
        let Some(message) = updated else {
            return;
        };

        if self.indicator == Some(StreamIndicator::Thinking) {
            self.indicator = Some(StreamIndicator::Typing);
        }
        if self.state != ExchangeState::Streaming {
            debug!(message_id = %id, from = ?self.state, "First chunk received");
            self.state = ExchangeState::Streaming;
        }
        debug!(message_id = %id, chunk_len = text.len(), total = message.content.len(), "Chunk applied");
    }

    fn on_complete(&mut self, id: MessageId) {
        if !self.is_active(id) {
            debug!(message_id = %id, "Ignoring completion for inactive message");
            return;
        }
        let Some(message) = self.update_message(id, |m| Some(m.settled())) else {
            return;
        };

        self.settle(Settlement::Completed);
        if message.content.is_empty() {
            info!(message_id = %id, "Empty completion, nothing to persist");
        } else {
            self.persist(&message);
        }
        self.state = ExchangeState::Idle;
    }

    fn on_error(&mut self, id: MessageId, error: TransportError) {
        if !self.is_active(id) {
            debug!(message_id = %id, error = %error, "Ignoring error for inactive message");
            return;
        }
        let err = ChatError::Transport(error);
        let inline = err.user_message();
        self.update_message(id, |m| Some(m.failed(inline)));

        warn!(message_id = %id, error = %err, "Exchange failed");
        self.last_error = Some(err);
        self.settle(Settlement::Errored);
        self.state = ExchangeState::Idle;
    }

    fn settle(&mut self, settlement: Settlement) {
        self.active = None;
        self.indicator = None;
        self.state = ExchangeState::Settled(settlement);
        self.last_settlement = Some(settlement);
        info!(outcome = ?settlement, "Exchange settled");
    }

    /// Read, compute and replace one message by id.
    ///
    /// `f` returns `None` to leave the message unchanged.
    fn update_message<F>(&mut self, id: MessageId, f: F) -> Option<Message>
    where
        F: FnOnce(&Message) -> Option<Message>,
    {
        let index = self.messages.iter().position(|m| m.id == id)?;
        let next = f(&self.messages[index])?;
        self.messages[index] = next.clone();
        Some(next)
    }

    /// Write a message once. Duplicate saves are suppressed.
    fn persist(&mut self, message: &Message) -> bool {
        if self.saved.contains(&message.id) {
            let violation = ChatError::ConcurrencyViolation(message.id.to_string());
            debug!(error = %violation, "Duplicate save suppressed");
            return false;
        }
        if !self.ensure_conversation_stored() {
            return false;
        }

        match self.store.add_message(message) {
            Ok(_) => {
                self.saved.insert(message.id);
                if let Some(conversation) = self.conversation.as_mut() {
                    conversation.touch();
                }
                true
            }
            Err(e) => {
                let err = ChatError::persistence(e);
                error!(message_id = %message.id, error = %err, "Failed to persist message");
                self.last_error = Some(err);
                false
            }
        }
    }

    /// Apply a generated title unless the conversation was titled meanwhile
    fn on_title_ready(&mut self, conversation_id: ConversationId, title: &str) {
        if self.titling == Some(conversation_id) {
            self.titling = None;
        }

        match self.store.get_conversation(&conversation_id) {
            Ok(Some(stored)) if !stored.needs_title() => {
                debug!(conversation_id = %conversation_id, "Conversation already titled");
                self.apply_title(conversation_id, &stored.title);
                return;
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to read conversation before titling"),
        }
        let renamed = self
            .conversation
            .as_ref()
            .is_some_and(|c| c.id == conversation_id && !c.needs_title());
        if renamed {
            debug!(conversation_id = %conversation_id, "Conversation renamed before title arrived");
            return;
        }

        self.store.update_title(&conversation_id, title).log_err();
        self.apply_title(conversation_id, title);
        info!(conversation_id = %conversation_id, title = %title, "Conversation titled");
    }

    fn apply_title(&mut self, conversation_id: ConversationId, title: &str) {
        if let Some(conversation) = self.conversation.as_mut().filter(|c| c.id == conversation_id) {
            conversation.title = title.to_string();
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Abandon the active exchange. Its partial content stays in memory.
    ///
    /// Returns the abandoned assistant message id. The caller resets any
    /// `StreamRenderer` showing that message so its pending cycle is dropped.
    pub fn cancel(&mut self) -> Option<MessageId> {
        let id = self.active.take()?;
        self.update_message(id, |m| m.is_streaming.then(|| m.settled()));
        self.indicator = None;
        self.state = ExchangeState::Idle;
        info!(message_id = %id, "Exchange cancelled");
        Some(id)
    }

    /// Start a fresh, not yet persisted conversation.
    ///
    /// Returns the abandoned assistant message id, as `cancel` does.
    pub fn new_chat(&mut self) -> Option<MessageId> {
        let abandoned = self.cancel();
        self.conversation = None;
        self.conversation_stored = false;
        self.titling = None;
        self.messages.clear();
        self.saved.clear();
        self.last_error = None;
        debug!("New chat started");
        abandoned
    }

    /// Make a stored conversation current.
    ///
    /// Returns the abandoned assistant message id, as `cancel` does.
    pub fn select_conversation(
        &mut self,
        id: &ConversationId,
    ) -> Result<Option<MessageId>, ChatError> {
        let conversation = self
            .store
            .get_conversation(id)
            .map_err(ChatError::persistence)?
            .ok_or_else(|| ChatError::ConversationNotFound(id.to_string()))?;
        let messages = self.store.get_messages(id).map_err(ChatError::persistence)?;

        let abandoned = self.cancel();
        self.saved = messages.iter().map(|m| m.id).collect();
        self.messages = messages;
        self.conversation = Some(conversation);
        self.conversation_stored = true;
        self.titling = None;
        self.last_error = None;
        info!(conversation_id = %id, messages = self.messages.len(), "Conversation selected");
        Ok(abandoned)
    }

    pub fn load_recent(&self, limit: usize) -> Result<Vec<Conversation>, ChatError> {
        self.store.list_recent(limit).map_err(ChatError::persistence)
    }

    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Conversation>, ChatError> {
        self.store
            .search_conversations(query, limit)
            .map_err(ChatError::persistence)
    }

    /// Delete a conversation; deleting the current one starts a new chat
    pub fn delete_conversation(&mut self, id: &ConversationId) -> Result<bool, ChatError> {
        if self.conversation_id() == Some(*id) {
            self.new_chat();
        }
        self.store
            .delete_conversation(id)
            .map_err(ChatError::persistence)
    }

    pub fn set_pinned(&mut self, id: &ConversationId, pinned: bool) -> Result<(), ChatError> {
        self.store
            .update_pin(id, pinned)
            .map_err(ChatError::persistence)?;
        if let Some(conversation) = self.conversation.as_mut().filter(|c| c.id == *id) {
            conversation.is_pinned = pinned;
        }
        Ok(())
    }

    pub fn rename(&mut self, id: &ConversationId, title: &str) -> Result<(), ChatError> {
        let title = title.trim();
        self.store
            .update_title(id, title)
            .map_err(ChatError::persistence)?;
        self.apply_title(*id, title);
        Ok(())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
