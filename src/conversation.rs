//! Conversation history handed over by the chat layer.
//!
//! Stored as a JSON array of messages. Diagram generation only ever reads it.

use crate::message::{Message, Role};
use crate::storage;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn load(path: &Path) -> Result<Self> {
        storage::read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        storage::write_json(path, self)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Record an accepted diagram script after the conversation it came from
    pub fn push_diagram(&mut self, script: &str) {
        self.messages.push(Message::diagram(script));
    }

    pub fn has_content(&self) -> bool {
        has_conversational_messages(&self.messages)
    }

    pub fn transcript(&self) -> String {
        transcript(&self.messages)
    }
}

pub fn has_conversational_messages(messages: &[Message]) -> bool {
    messages.iter().any(|m| m.role.is_conversational())
}

/// One `role: text` block per user/assistant message, newline separated
pub fn transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| m.role.is_conversational())
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Count of messages per role, for logging
pub fn role_counts(messages: &[Message]) -> (usize, usize) {
    let users = messages.iter().filter(|m| m.role == Role::User).count();
    let assistants = messages.iter().filter(|m| m.role == Role::Assistant).count();
    (users, assistants)
}
