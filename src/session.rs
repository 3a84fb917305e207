use crate::events::{AppEvent, ChatMessage, TurnId};
use crate::llm::CompletionBackend;
use crate::markup::{self, Document};
use crate::transcript::Transcript;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// Text shown in place of a reply when a turn fails
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// Rendering collaborator notified as a turn progresses
pub trait ChatView: Send + Sync {
    /// The user's message was accepted for this turn
    fn user_message(&self, turn: TurnId, content: &str);

    /// Show a placeholder while the turn waits for its reply
    fn pending(&self, turn: TurnId);

    /// Replace the placeholder with the formatted reply
    fn reply(&self, turn: TurnId, document: &Document);

    /// Replace the placeholder with the fallback text
    fn fallback(&self, turn: TurnId, text: &str);
}

/// Forwards view signals to the chat panel's event loop
impl ChatView for mpsc::UnboundedSender<AppEvent> {
    fn user_message(&self, turn: TurnId, content: &str) {
        let _ = self.send(AppEvent::UserMessage {
            turn,
            content: content.to_string(),
        });
    }

    fn pending(&self, turn: TurnId) {
        let _ = self.send(AppEvent::Pending { turn });
    }

    fn reply(&self, turn: TurnId, document: &Document) {
        let _ = self.send(AppEvent::Reply {
            turn,
            document: document.clone(),
        });
    }

    fn fallback(&self, turn: TurnId, text: &str) {
        let _ = self.send(AppEvent::Fallback {
            turn,
            text: text.to_string(),
        });
    }
}

/// How a submitted turn ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Answered { turn: TurnId, reply: String },
    Failed { turn: TurnId },
}

impl TurnOutcome {
    pub fn turn(&self) -> TurnId {
        match self {
            TurnOutcome::Answered { turn, .. } | TurnOutcome::Failed { turn } => *turn,
        }
    }
}

/// One chat session: owns the transcript and runs turns against a backend.
///
/// Overlapping submissions queue. The transcript stays locked for a whole
/// turn and the lock is FIFO, so turns complete in call order and each one
/// records its own user/assistant pair.
pub struct ChatSession {
    id: Uuid,
    system_prompt: String,
    transcript: Mutex<Transcript>,
    backend: Arc<dyn CompletionBackend>,
    next_turn: AtomicU64,
    in_flight: AtomicUsize,
}

impl ChatSession {
    pub fn new(system_prompt: impl Into<String>, backend: Arc<dyn CompletionBackend>) -> Self {
        let id = Uuid::new_v4();
        let system_prompt = system_prompt.into();
        log::info!("Chat session {} started", id);
        Self {
            id,
            transcript: Mutex::new(Transcript::new(system_prompt.clone())),
            system_prompt,
            backend,
            next_turn: AtomicU64::new(1),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The prompt the transcript was seeded with
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Turns accepted but not yet resolved
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Copy of the transcript. Waits for any running turn to finish.
    pub async fn transcript(&self) -> Transcript {
        self.transcript.lock().await.clone()
    }

    /// Submit user text as a new turn.
    ///
    /// Blank input is ignored and returns `None`. Otherwise the user message
    /// is recorded, one completion request is made with the whole transcript,
    /// and the reply is recorded and shown. On failure the view gets
    /// [`FALLBACK_REPLY`] and no assistant message is recorded.
    pub async fn submit(&self, user_text: &str, view: &dyn ChatView) -> Option<TurnOutcome> {
        let text = user_text.trim();
        if text.is_empty() {
            log::debug!("Ignoring blank submission");
            return None;
        }

        let turn = TurnId(self.next_turn.fetch_add(1, Ordering::SeqCst));
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        view.user_message(turn, text);
        view.pending(turn);

        let mut transcript = self.transcript.lock().await;
        transcript.append(ChatMessage::user(text));
        log::info!(
            "Session {} turn {}: sending {} messages",
            self.id,
            turn,
            transcript.len()
        );

        let outcome = match self.backend.complete(transcript.snapshot()).await {
            Ok(reply) => {
                transcript.append(ChatMessage::assistant(reply.clone()));
                view.reply(turn, &markup::parse(&reply));
                log::info!("Session {} turn {}: answered", self.id, turn);
                TurnOutcome::Answered { turn, reply }
            }
            Err(e) => {
                log::error!("Session {} turn {}: completion failed: {}", self.id, turn, e);
                view.fallback(turn, FALLBACK_REPLY);
                TurnOutcome::Failed { turn }
            }
        };

        drop(transcript);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Some(outcome)
    }
}
