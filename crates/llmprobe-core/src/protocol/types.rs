//! Request/response types shared across all protocol adapters.
//!
//! These are the protocol-neutral shapes the orchestrator speaks; each
//! adapter translates them to and from its own wire format.

use serde::{Deserialize, Serialize};

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// Token accounting as reported by the provider. `None` on an outcome means
/// the provider did not report usage at all, distinct from zero tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Result of one non-streaming completion.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// Result of one streaming completion.
#[derive(Debug, Clone)]
pub struct StreamOutcome {
    /// Concatenation of all content deltas.
    pub content: String,
    /// Number of content-bearing deltas received.
    pub chunk_count: u32,
    /// Milliseconds from request dispatch to the first content delta.
    /// 0 means no delta ever arrived; any received delta reports >= 1.
    pub ttft_ms: u64,
    /// Usage from the stream's terminal event, when the protocol carries it.
    pub usage: Option<TokenUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let user = ChatMessage::user("hello");
        assert_eq!(user.role, "user");
        assert_eq!(user.content, "hello");

        let assistant = ChatMessage::assistant("hi");
        assert_eq!(assistant.role, "assistant");
    }

    #[test]
    fn test_message_serializes_flat() {
        let msg = ChatMessage::user("ping");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "ping"}));
    }

    #[test]
    fn test_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 12,
            completion_tokens: 30,
        };
        assert_eq!(usage.total(), 42);
    }
}
