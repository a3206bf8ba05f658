//! Seed chat context: the messages that prime the model with situational
//! framing before the live conversation starts.

use serde::{Deserialize, Serialize};

/// Author of a seed or conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    Assistant,
    User,
}

/// A single seed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

/// Ordered seed messages established before the session starts.
///
/// Append-only during setup; once the session launcher hands the context to
/// the runtime it is never modified again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContext {
    messages: Vec<ChatMessage>,
}

impl ChatContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a seed message, preserving insertion order.
    pub fn append(&mut self, role: ChatRole, text: impl Into<String>) {
        self.messages.push(ChatMessage {
            role,
            text: text.into(),
        });
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let mut ctx = ChatContext::new();
        ctx.append(ChatRole::Assistant, "first");
        ctx.append(ChatRole::User, "second");

        let messages = ctx.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::Assistant);
        assert_eq!(messages[0].text, "first");
        assert_eq!(messages[1].role, ChatRole::User);
        assert_eq!(messages[1].text, "second");
    }

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&ChatRole::Assistant).unwrap(),
            "\"assistant\""
        );
        assert_eq!(
            serde_json::to_string(&ChatRole::System).unwrap(),
            "\"system\""
        );
    }

    #[test]
    fn new_context_is_empty() {
        assert!(ChatContext::new().is_empty());
    }
}
