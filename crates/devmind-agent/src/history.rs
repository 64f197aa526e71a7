//! Conversation history owned by an agent.
//!
//! The first entry is always the system prompt. Everything after it is the
//! running transcript, which may be bounded: when the number of non-system
//! messages exceeds the cap, the oldest exchanges are dropped so the retained
//! tail starts at a user message and no tool result loses the assistant
//! message that requested it.

use devmind_llm::{Message, Role};

/// Ordered message log with a pinned system prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    /// Start a history with the given system prompt.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages, system prompt first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Total number of messages including the system prompt.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing but the system prompt is present.
    pub fn is_empty(&self) -> bool {
        self.messages.len() <= 1
    }

    /// Number of messages after the system prompt.
    pub fn non_system_len(&self) -> usize {
        self.messages.len().saturating_sub(1)
    }

    /// The system prompt.
    pub fn system_prompt(&self) -> &str {
        self.messages
            .first()
            .and_then(Message::text)
            .unwrap_or_default()
    }

    /// Drop everything except the system prompt.
    pub fn reset(&mut self) {
        self.messages.truncate(1);
    }

    /// Enforce a cap on non-system messages.
    ///
    /// Drops the oldest non-system messages until at most `limit` remain, then
    /// keeps dropping until the first retained message is a user message.
    /// Returns the number of messages removed.
    pub fn enforce_limit(&mut self, limit: usize) -> usize {
        let body = self.non_system_len();
        if body <= limit {
            return 0;
        }

        let mut cut = 1 + (body - limit);
        while cut < self.messages.len() && self.messages[cut].role() != Role::User {
            cut += 1;
        }

        let removed = cut - 1;
        self.messages.drain(1..cut);
        removed
    }
}
