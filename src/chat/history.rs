//! Conversation history
//!
//! Ordered, role-tagged messages forming the model prompt. The sequence is
//! append-only with one exception: the most recent assistant message may be
//! amended in place while it is still being spoken (the interruption marker).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a message in the conversation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// System instructions
    System,
    /// Participant input (transcribed speech)
    User,
    /// Agent output (spoken replies)
    Assistant,
}

impl Role {
    /// Convert to the string representation model providers expect
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message in the conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Stable identifier, used to refer to an in-flight spoken message
    pub id: Uuid,

    /// Role of the message sender
    pub role: Role,

    /// Message text
    pub content: String,

    /// When the message was created
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Manages the conversation history for one session
#[derive(Clone, Debug)]
pub struct ChatHistory {
    /// System prompt (always first in the rendered prompt)
    system_prompt: String,

    /// Conversation messages in append order
    messages: Vec<ChatMessage>,

    /// Maximum number of messages to keep
    max_messages: usize,
}

impl ChatHistory {
    /// Create a new history with the given system prompt
    pub fn new(system_prompt: impl Into<String>, max_messages: usize) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
            max_messages: max_messages.max(1),
        }
    }

    /// Get the system prompt
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Append the participant's transcribed utterance
    pub fn push_user(&mut self, content: impl Into<String>) -> Uuid {
        self.push(ChatMessage::user(content))
    }

    /// Append an agent utterance
    pub fn push_assistant(&mut self, content: impl Into<String>) -> Uuid {
        self.push(ChatMessage::assistant(content))
    }

    /// Append a system message (round summaries)
    pub fn push_system(&mut self, content: impl Into<String>) -> Uuid {
        self.push(ChatMessage::system(content))
    }

    fn push(&mut self, message: ChatMessage) -> Uuid {
        let id = message.id;
        self.messages.push(message);
        self.trim_to_fit();
        id
    }

    /// Render the full prompt: system prompt followed by the history
    pub fn prompt_messages(&self) -> Vec<ChatMessage> {
        let mut result = vec![ChatMessage::system(self.system_prompt.clone())];
        result.extend(self.messages.iter().cloned());
        result
    }

    /// The conversation messages, without the system prompt
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Mutable access to the most recent assistant message, while it is
    /// still in flight. This is the single allowed in-place mutation.
    pub fn last_assistant_mut(&mut self) -> Option<&mut ChatMessage> {
        self.messages
            .iter_mut()
            .rev()
            .find(|m| m.role == Role::Assistant)
    }

    /// The most recent assistant message together with the conversation
    /// messages that preceded it (the context the reply was generated from)
    pub fn last_assistant_context_mut(&mut self) -> Option<(&[ChatMessage], &mut ChatMessage)> {
        let index = self.messages.iter().rposition(|m| m.role == Role::Assistant)?;
        let (before, rest) = self.messages.split_at_mut(index);
        Some((&*before, &mut rest[0]))
    }

    /// The most recent assistant message
    pub fn last_assistant(&self) -> Option<&ChatMessage> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
    }

    /// Number of messages in the history
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the history holds no messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Clear conversation history
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn trim_to_fit(&mut self) {
        while self.messages.len() > self.max_messages {
            self.messages.remove(0);
        }
    }

    /// Export the history to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.messages)
    }

    /// Replace the history with messages parsed from JSON
    pub fn from_json(&mut self, json: &str) -> Result<(), serde_json::Error> {
        let messages: Vec<ChatMessage> = serde_json::from_str(json)?;
        self.messages = messages;
        self.trim_to_fit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = ChatMessage::user("Hello, world!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, world!");
    }

    #[test]
    fn test_prompt_ordering() {
        let mut history = ChatHistory::new("System prompt", 100);
        history.push_user("Hello");
        history.push_assistant("Hi there!");

        let prompt = history.prompt_messages();
        assert_eq!(prompt.len(), 3);
        assert_eq!(prompt[0].role, Role::System);
        assert_eq!(prompt[1].role, Role::User);
        assert_eq!(prompt[2].role, Role::Assistant);
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let mut history = ChatHistory::new("System", 100);
        for i in 0..8 {
            history.push_user(format!("user {}", i));
            history.push_assistant(format!("assistant {}", i));
        }

        let json = history.to_json().unwrap();
        let mut restored = ChatHistory::new("System", 100);
        restored.from_json(&json).unwrap();

        assert_eq!(restored.len(), history.len());
        for (a, b) in history.messages().iter().zip(restored.messages()) {
            assert_eq!(a.role, b.role);
            assert_eq!(a.content, b.content);
        }
    }

    #[test]
    fn test_amend_last_assistant() {
        let mut history = ChatHistory::new("System", 100);
        history.push_user("Hello");
        history.push_assistant("Working on it");
        history.push_user("Wait");

        let msg = history.last_assistant_mut().unwrap();
        msg.content.push_str("... (user interrupted you)");

        assert!(history
            .last_assistant()
            .unwrap()
            .content
            .ends_with("(user interrupted you)"));
    }

    #[test]
    fn test_amend_context_precedes_the_reply() {
        let mut history = ChatHistory::new("System", 100);
        history.push_user("Turn on the lights");
        history.push_assistant("Turning them on");

        let (context, msg) = history.last_assistant_context_mut().unwrap();
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].content, "Turn on the lights");
        msg.content.push('!');

        assert_eq!(history.last_assistant().unwrap().content, "Turning them on!");
    }

    #[test]
    fn test_message_cap() {
        let mut history = ChatHistory::new("System", 4);
        for i in 0..10 {
            history.push_user(format!("msg {}", i));
        }

        assert_eq!(history.len(), 4);
        assert_eq!(history.messages()[0].content, "msg 6");
    }

    #[test]
    fn test_clear() {
        let mut history = ChatHistory::new("System", 100);
        history.push_user("Hello");
        history.clear();
        assert!(history.is_empty());
    }
}
