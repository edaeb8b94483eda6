use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role in conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    /// A generated diagram stored alongside the chat
    Diagram,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Diagram => "diagram",
        }
    }

    /// Only user and assistant turns feed diagram generation
    pub fn is_conversational(&self) -> bool {
        matches!(self, Role::User | Role::Assistant)
    }
}

/// A message in the conversation. Never mutated once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn user(text: &str) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: &str) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn system(text: &str) -> Self {
        Self::new(Role::System, text)
    }

    pub fn diagram(script: &str) -> Self {
        Self::new(Role::Diagram, script)
    }
}

/// Streaming event from provider
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Text content delta
    TextDelta(String),
    /// Message complete (may have stop reason)
    MessageEnd { stop_reason: Option<String> },
    /// Error occurred mid-stream
    Error {
        message: String,
        /// Seconds until rate limit resets (if this is a rate limit error)
        retry_after_secs: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));
    }

    #[test]
    fn test_missing_timestamp_defaults() {
        let msg: Message = serde_json::from_str(r#"{"role":"user","content":"hello"}"#).unwrap();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "hello");
    }

    #[test]
    fn test_conversational_roles() {
        assert!(Role::User.is_conversational());
        assert!(Role::Assistant.is_conversational());
        assert!(!Role::System.is_conversational());
        assert!(!Role::Diagram.is_conversational());
    }
}
