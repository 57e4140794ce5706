//! Protocol adapter trait and per-protocol implementations.
//!
//! Defines the `ProtocolAdapter` capability set that every wire protocol
//! must implement: `ping`, `chat`, `chat_stream`, `list_models`. Three
//! variants cover the ecosystem's incompatible API families:
//!
//! - [`openai`]: bearer auth, `/chat/completions`, `data:` SSE with `[DONE]`
//! - [`anthropic`]: `x-api-key` auth, `/messages`, typed SSE events
//! - [`gemini`]: query-param auth, `:generateContent` / `:streamGenerateContent`
//!
//! Adding a protocol means adding one [`ProtocolKind`] variant and one
//! module; callers dispatch through [`adapter_for`] and never touch wire
//! formats.

pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod sse;
pub mod types;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, ConfigError};
use types::{ChatMessage, ChatOutcome, StreamOutcome};

/// Deadline for the cheap reachability probe.
pub const PING_TIMEOUT: Duration = Duration::from_secs(15);
/// Deadline for the model-listing call.
pub const LIST_TIMEOUT: Duration = Duration::from_secs(15);
/// Deadline for one non-streaming completion.
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(30);
/// Deadline for a streaming completion, covering the whole body read.
pub const STREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Which wire protocol an endpoint speaks. Immutable per configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    Openai,
    Anthropic,
    Gemini,
}

impl ProtocolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ProtocolKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Self::Openai),
            "anthropic" => Ok(Self::Anthropic),
            "gemini" => Ok(Self::Gemini),
            other => Err(ConfigError::UnknownProtocol(other.to_string())),
        }
    }
}

/// The capability set every protocol variant implements.
///
/// Operations never panic and never take down sibling checks: every failure
/// mode comes back as an [`AdapterError`].
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// Cheapest viable request that proves reachability. Returns the raw
    /// HTTP status; classification (auth rejected vs. server error) is the
    /// orchestrator's job.
    async fn ping(&self) -> Result<u16, AdapterError>;

    /// One non-streaming completion.
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatOutcome, AdapterError>;

    /// One streaming completion, consumed incrementally so time-to-first-token
    /// can be observed without buffering the whole response.
    async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<StreamOutcome, AdapterError>;

    /// The protocol's model listing. May legitimately be unsupported by a
    /// given deployment; the orchestrator downgrades failures to a warning.
    async fn list_models(&self) -> Result<Vec<String>, AdapterError>;
}

/// Select the adapter for a declared protocol kind.
pub fn adapter_for(
    kind: ProtocolKind,
    client: Client,
    base_url: &str,
    api_key: &str,
) -> Box<dyn ProtocolAdapter> {
    match kind {
        ProtocolKind::Openai => Box::new(openai::OpenAiAdapter::new(client, base_url, api_key)),
        ProtocolKind::Anthropic => {
            Box::new(anthropic::AnthropicAdapter::new(client, base_url, api_key))
        }
        ProtocolKind::Gemini => Box::new(gemini::GeminiAdapter::new(client, base_url, api_key)),
    }
}

// ── Shared wire helpers ─────────────────────────────────────────────

/// All three protocols wrap errors in a `{"error":{"message":...}}` envelope.
pub(crate) fn error_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct Envelope {
        error: Inner,
    }
    #[derive(Deserialize)]
    struct Inner {
        message: String,
    }

    serde_json::from_str::<Envelope>(body)
        .ok()
        .map(|e| e.error.message)
}

/// Build the error for a non-2xx response, preferring the provider's own
/// message over a bare status line.
pub(crate) fn api_error(status: u16, body: &str) -> AdapterError {
    match error_message(body) {
        Some(message) => AdapterError::Api {
            status,
            message,
            body: truncate(body, 300),
        },
        None => AdapterError::Http {
            status,
            body: truncate(body, 300),
        },
    }
}

/// Trim and cap a diagnostic string, keeping char boundaries intact.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_kind_round_trip() {
        for kind in [
            ProtocolKind::Openai,
            ProtocolKind::Anthropic,
            ProtocolKind::Gemini,
        ] {
            assert_eq!(kind.as_str().parse::<ProtocolKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_protocol_is_config_error() {
        let err = "cohere".parse::<ProtocolKind>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProtocol(ref s) if s == "cohere"));
    }

    #[test]
    fn test_api_error_prefers_provider_message() {
        let body = r#"{"error":{"message":"model not found"}}"#;
        match api_error(404, body) {
            AdapterError::Api {
                status, message, ..
            } => {
                assert_eq!(status, 404);
                assert_eq!(message, "model not found");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_api_error_falls_back_to_status() {
        match api_error(502, "<html>bad gateway</html>") {
            AdapterError::Http { status, .. } => assert_eq!(status, 502),
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[test]
    fn test_truncate_caps_and_marks() {
        assert_eq!(truncate("  short  ", 300), "short");
        let long = "x".repeat(400);
        let out = truncate(&long, 300);
        assert_eq!(out.len(), 303);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "ééééé";
        let out = truncate(s, 3);
        assert!(out.ends_with("..."));
    }
}
