//! Conversation transcript types

use serde::{Deserialize, Serialize};

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// One (role, content) turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered conversation history handed to the router
///
/// The orchestration core reads it (the latest user turn drives the
/// guardrail) but never rewrites earlier turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transcript holding a single user request
    pub fn from_request(text: impl Into<String>) -> Self {
        let mut transcript = Self::new();
        transcript.push(ChatMessage::user(text));
        transcript
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Content of the most recent user turn
    pub fn latest_request(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
    }
}

impl From<Vec<ChatMessage>> for Transcript {
    fn from(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_request() {
        let mut transcript = Transcript::from_request("list my vaults");
        transcript.push(ChatMessage::assistant("Which subscription?"));
        transcript.push(ChatMessage::user("the EDW one"));
        transcript.push(ChatMessage::assistant("Switched."));

        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript.latest_request(), Some("the EDW one"));
        assert_eq!(Transcript::new().latest_request(), None);
    }

    #[test]
    fn test_transcript_serialization() {
        let transcript = Transcript::from_request("Hello");
        let json = serde_json::to_string(&transcript).unwrap();
        assert_eq!(json, r#"[{"role":"user","content":"Hello"}]"#);
    }
}
