//! Streaming sources and the event channel back into the session.
//!
//! A source never touches session state. It reports progress through a
//! `StreamSink`, which turns each callback into a `SessionEvent` tagged with
//! the assistant message it belongs to.

use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::model::{ConversationId, MessageId, MessageRole, ModelInfo};
use crate::error::TransportError;

/// A message in provider-agnostic form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ProviderMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }
}

/// Events drained by `ChatSession`, in delivery order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// An incremental text fragment for an assistant message
    Chunk { message_id: MessageId, text: String },
    /// The stream ended normally
    Complete { message_id: MessageId },
    /// The stream ended with a transport failure
    Error {
        message_id: MessageId,
        error: TransportError,
    },
    /// A background title generator finished
    TitleReady {
        conversation_id: ConversationId,
        title: String,
    },
}

/// Push-style callbacks for one completion
#[derive(Debug, Clone)]
pub struct StreamSink {
    message_id: MessageId,
    sender: Sender<SessionEvent>,
}

impl StreamSink {
    pub fn new(message_id: MessageId, sender: Sender<SessionEvent>) -> Self {
        Self { message_id, sender }
    }

    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    /// Deliver a fragment. Returns false once the session is gone.
    pub fn chunk(&self, text: impl Into<String>) -> bool {
        self.send(SessionEvent::Chunk {
            message_id: self.message_id,
            text: text.into(),
        })
    }

    pub fn complete(&self) -> bool {
        self.send(SessionEvent::Complete {
            message_id: self.message_id,
        })
    }

    pub fn error(&self, error: impl Into<TransportError>) -> bool {
        self.send(SessionEvent::Error {
            message_id: self.message_id,
            error: error.into(),
        })
    }

    fn send(&self, event: SessionEvent) -> bool {
        match self.sender.send(event) {
            Ok(()) => true,
            Err(_) => {
                debug!(message_id = %self.message_id, "Session dropped, discarding stream event");
                false
            }
        }
    }
}

/// Something that can stream a completion
///
/// Implementations report through `sink` and may do so from another thread.
/// Retry and backoff are the source's concern.
pub trait StreamingSource: Send + Sync {
    fn start_completion(&self, model: &ModelInfo, prior: &[ProviderMessage], sink: StreamSink);
}

/// How a scripted completion ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    Complete,
    Fail(TransportError),
}

#[derive(Debug, Clone)]
enum Script {
    Chunks(Vec<String>),
    /// Word-split canned reply to the last user message
    MockReply,
}

/// Deterministic source for tests and the demo CLI
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    script: Script,
    outcome: ScriptedOutcome,
    pace: Option<Duration>,
}

impl ScriptedSource {
    /// Deliver exactly these chunks, then complete
    pub fn with_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Script::Chunks(chunks.into_iter().map(Into::into).collect()),
            outcome: ScriptedOutcome::Complete,
            pace: None,
        }
    }

    /// Reply to the last user message with a canned, word-streamed answer
    pub fn mock_reply() -> Self {
        Self {
            script: Script::MockReply,
            outcome: ScriptedOutcome::Complete,
            pace: None,
        }
    }

    /// End with `error` instead of completing
    pub fn failing_with(mut self, error: TransportError) -> Self {
        self.outcome = ScriptedOutcome::Fail(error);
        self
    }

    /// Deliver from a background thread, sleeping `pace` between chunks
    pub fn paced(mut self, pace: Duration) -> Self {
        self.pace = Some(pace);
        self
    }

    fn chunks_for(&self, prior: &[ProviderMessage]) -> Vec<String> {
        match &self.script {
            Script::Chunks(chunks) => chunks.clone(),
            Script::MockReply => {
                let last_user = prior
                    .iter()
                    .rev()
                    .find(|m| m.role == MessageRole::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or_default();
                mock_response(last_user)
                    .split_inclusive(char::is_whitespace)
                    .map(str::to_string)
                    .collect()
            }
        }
    }
}

fn deliver(chunks: Vec<String>, outcome: ScriptedOutcome, pace: Option<Duration>, sink: StreamSink) {
    for chunk in chunks {
        if let Some(pace) = pace {
            thread::sleep(pace);
        }
        if !sink.chunk(chunk) {
            return;
        }
    }
    match outcome {
        ScriptedOutcome::Complete => sink.complete(),
        ScriptedOutcome::Fail(error) => sink.error(error),
    };
}

impl StreamingSource for ScriptedSource {
    fn start_completion(&self, model: &ModelInfo, prior: &[ProviderMessage], sink: StreamSink) {
        let chunks = self.chunks_for(prior);
        debug!(
            model = %model.id,
            message_id = %sink.message_id(),
            chunk_count = chunks.len(),
            paced = self.pace.is_some(),
            "Starting scripted completion"
        );

        let outcome = self.outcome.clone();
        match self.pace {
            None => deliver(chunks, outcome, None, sink),
            Some(pace) => {
                let spawned = thread::Builder::new()
                    .name("scripted-source".into())
                    .spawn(move || deliver(chunks, outcome, Some(pace), sink));
                if let Err(e) = spawned {
                    warn!(error = %e, "Failed to spawn scripted source thread");
                }
            }
        }
    }
}

/// Canned replies keyed on a few common prompts
fn mock_response(user_message: &str) -> String {
    let msg_lower = user_message.to_lowercase();

    if msg_lower.starts_with("hello") || msg_lower.starts_with("hi") || msg_lower.starts_with("hey") {
        return "Hi there! I'm a scripted assistant. Ask me for some **code** or a **table** to see streaming Markdown.".to_string();
    }

    if msg_lower.contains("code") || msg_lower.contains("example") {
        return "Here's a small example:\n\n```rust\nfn main() {\n    println!(\"Hello, world!\");\n}\n```\n\nIt prints a greeting and exits.".to_string();
    }

    if msg_lower.contains("table") {
        return "| Feature | Status |\n|---|---|\n| Streaming | done |\n| Sanitizing | done |\n| Persistence | done |".to_string();
    }

    format!(
        "I received your message: \"{}\"\n\n\
        This reply is **scripted**. A real provider would stream its answer \
        the same way, one fragment at a time.",
        user_message.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn drain(rx: &mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_chunks_then_complete_in_order() {
        let (tx, rx) = mpsc::channel();
        let id = MessageId::new();
        let source = ScriptedSource::with_chunks(["Hi", " there"]);
        source.start_completion(&ModelInfo::new("m", "M"), &[], StreamSink::new(id, tx));

        assert_eq!(
            drain(&rx),
            vec![
                SessionEvent::Chunk {
                    message_id: id,
                    text: "Hi".into()
                },
                SessionEvent::Chunk {
                    message_id: id,
                    text: " there".into()
                },
                SessionEvent::Complete { message_id: id },
            ]
        );
    }

    #[test]
    fn test_failing_source_ends_with_error() {
        let (tx, rx) = mpsc::channel();
        let id = MessageId::new();
        let source = ScriptedSource::with_chunks(Vec::<String>::new())
            .failing_with(TransportError::Timeout);
        source.start_completion(&ModelInfo::new("m", "M"), &[], StreamSink::new(id, tx));

        assert_eq!(
            drain(&rx),
            vec![SessionEvent::Error {
                message_id: id,
                error: TransportError::Timeout
            }]
        );
    }

    #[test]
    fn test_mock_reply_streams_whole_words() {
        let (tx, rx) = mpsc::channel();
        let id = MessageId::new();
        let prior = [ProviderMessage::user("hello")];
        ScriptedSource::mock_reply().start_completion(
            &ModelInfo::new("m", "M"),
            &prior,
            StreamSink::new(id, tx),
        );

        let text: String = drain(&rx)
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Chunk { text, .. } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(text, mock_response("hello"));
    }

    #[test]
    fn test_paced_source_delivers_from_thread() {
        let (tx, rx) = mpsc::channel();
        let id = MessageId::new();
        ScriptedSource::with_chunks(["a", "b"])
            .paced(Duration::from_millis(1))
            .start_completion(&ModelInfo::new("m", "M"), &[], StreamSink::new(id, tx));

        let mut events = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(5)) {
            let done = matches!(event, SessionEvent::Complete { .. });
            events.push(event);
            if done {
                break;
            }
        }
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_sink_reports_dropped_receiver() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let sink = StreamSink::new(MessageId::new(), tx);
        assert!(!sink.chunk("x"));
    }
}
