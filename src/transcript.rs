use crate::events::{ChatMessage, ChatRole};

/// Ordered, append-only record of a conversation.
///
/// The first message is always the system prompt given at construction.
/// Messages are never removed; the transcript lives as long as its session.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
        }
    }

    /// Add a message to the end of the conversation
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Copy of the whole conversation, in order, for building a request
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }

    #[allow(dead_code)]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Number of assistant replies recorded so far
    pub fn reply_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|message| message.role() == ChatRole::Assistant)
            .count()
    }
}
