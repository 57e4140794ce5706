//! Anthropic-style protocol adapter.
//!
//! `x-api-key` auth plus a pinned `anthropic-version` header,
//! `POST {base}/messages` with a required `max_tokens`, and typed SSE events
//! (`message_start`, `content_block_delta`, `message_delta`) where usage is
//! split across the opening and terminal events.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::sse::{self, SseDelta};
use super::types::{ChatMessage, ChatOutcome, StreamOutcome, TokenUsage};
use super::{api_error, truncate, ProtocolAdapter};
use super::{CHAT_TIMEOUT, LIST_TIMEOUT, PING_TIMEOUT, STREAM_TIMEOUT};
use crate::error::AdapterError;
use crate::measure::Stopwatch;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Upper bound for probe completions; checks need an answer, not an essay.
const MAX_TOKENS: u32 = 256;

pub struct AnthropicAdapter {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AnthropicAdapter {
    pub fn new(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<UsageBody>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct UsageBody {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct StreamEvent {
    #[serde(default)]
    delta: Option<EventDelta>,
    #[serde(default)]
    usage: Option<UsageBody>,
    #[serde(default)]
    message: Option<MessageStart>,
}

#[derive(Deserialize, Default)]
struct EventDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct MessageStart {
    #[serde(default)]
    usage: Option<UsageBody>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

// ── ProtocolAdapter implementation ──────────────────────────────────

#[async_trait]
impl ProtocolAdapter for AnthropicAdapter {
    async fn ping(&self) -> Result<u16, AdapterError> {
        let url = format!("{}/models", self.base_url);
        let resp = self
            .authorize(self.client.get(&url))
            .timeout(PING_TIMEOUT)
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(e, PING_TIMEOUT))?;
        Ok(resp.status().as_u16())
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatOutcome, AdapterError> {
        let url = format!("{}/messages", self.base_url);
        let body = json!({ "model": model, "messages": messages, "max_tokens": MAX_TOKENS });
        debug!(url = %url, model, "anthropic chat request");

        let resp = self
            .authorize(self.client.post(&url))
            .timeout(CHAT_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(e, CHAT_TIMEOUT))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| AdapterError::from_reqwest(e, CHAT_TIMEOUT))?;
        if !(200..300).contains(&status) {
            return Err(api_error(status, &text));
        }

        let parsed: MessageResponse =
            serde_json::from_str(&text).map_err(|e| AdapterError::Decode {
                message: e.to_string(),
                body: truncate(&text, 300),
            })?;
        if parsed.content.is_empty() {
            return Err(AdapterError::Decode {
                message: "empty content in response".into(),
                body: truncate(&text, 300),
            });
        }

        let content: String = parsed.content.into_iter().map(|b| b.text).collect();
        let usage = parsed.usage.map(|u| TokenUsage {
            prompt_tokens: u.input_tokens.unwrap_or(0),
            completion_tokens: u.output_tokens.unwrap_or(0),
        });
        Ok(ChatOutcome { content, usage })
    }

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<StreamOutcome, AdapterError> {
        let url = format!("{}/messages", self.base_url);
        let body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": MAX_TOKENS,
            "stream": true,
        });
        debug!(url = %url, model, "anthropic stream request");

        let watch = Stopwatch::start();
        let resp = self
            .authorize(self.client.post(&url))
            .timeout(STREAM_TIMEOUT)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(e, STREAM_TIMEOUT))?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let text = resp.text().await.unwrap_or_default();
            return Err(api_error(status, &text));
        }

        // Input tokens arrive on message_start, output tokens on the
        // terminal message_delta; stitch them together across events.
        let mut input_tokens: Option<u32> = None;
        let mut output_tokens: Option<u32> = None;

        let outcome = sse::collect_sse(resp, &watch, |payload| {
            let event: StreamEvent = serde_json::from_str(payload).ok()?;
            if let Some(u) = event.message.and_then(|m| m.usage) {
                if u.input_tokens.is_some() {
                    input_tokens = u.input_tokens;
                }
            }
            if let Some(u) = event.usage {
                if u.input_tokens.is_some() {
                    input_tokens = u.input_tokens;
                }
                if u.output_tokens.is_some() {
                    output_tokens = u.output_tokens;
                }
            }
            let text = event.delta.and_then(|d| d.text).unwrap_or_default();
            Some(SseDelta { text, usage: None })
        })
        .await?;

        let usage = if input_tokens.is_some() || output_tokens.is_some() {
            Some(TokenUsage {
                prompt_tokens: input_tokens.unwrap_or(0),
                completion_tokens: output_tokens.unwrap_or(0),
            })
        } else {
            None
        };
        Ok(StreamOutcome { usage, ..outcome })
    }

    async fn list_models(&self) -> Result<Vec<String>, AdapterError> {
        let url = format!("{}/models", self.base_url);
        let resp = self
            .authorize(self.client.get(&url))
            .timeout(LIST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(e, LIST_TIMEOUT))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| AdapterError::from_reqwest(e, LIST_TIMEOUT))?;
        if !(200..300).contains(&status) {
            return Err(api_error(status, &text));
        }

        let parsed: ModelList = serde_json::from_str(&text).map_err(|e| AdapterError::Decode {
            message: e.to_string(),
            body: truncate(&text, 300),
        })?;
        Ok(parsed.data.into_iter().map(|m| m.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_response_joins_content_blocks() {
        let parsed: MessageResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"a"},{"type":"text","text":"b"}],
                "usage":{"input_tokens":3,"output_tokens":4}}"#,
        )
        .unwrap();
        let content: String = parsed.content.into_iter().map(|b| b.text).collect();
        assert_eq!(content, "ab");
    }

    #[test]
    fn test_stream_event_shapes() {
        let start: StreamEvent = serde_json::from_str(
            r#"{"type":"message_start","message":{"usage":{"input_tokens":9}}}"#,
        )
        .unwrap();
        assert_eq!(
            start.message.unwrap().usage.unwrap().input_tokens,
            Some(9)
        );

        let delta: StreamEvent = serde_json::from_str(
            r#"{"type":"content_block_delta","delta":{"type":"text_delta","text":"hi"}}"#,
        )
        .unwrap();
        assert_eq!(delta.delta.unwrap().text.as_deref(), Some("hi"));

        let terminal: StreamEvent = serde_json::from_str(
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":6}}"#,
        )
        .unwrap();
        assert_eq!(terminal.usage.unwrap().output_tokens, Some(6));
    }
}
