//! OpenAI-style protocol adapter.
//!
//! Covers every provider exposing an OpenAI-compatible surface (OpenAI
//! itself, DeepSeek, Groq, OpenRouter, vLLM, Ollama and friends):
//! bearer-token auth, `POST {base}/chat/completions`, `GET {base}/models`,
//! and `data:`-framed SSE terminated by `[DONE]`.

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

pub struct OpenAiAdapter {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiAdapter {
    pub fn new(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Bearer auth; the header is omitted entirely for anonymous targets
    /// (local vLLM/Ollama deployments accept that, and a rejecting server
    /// still answers with a status we can report).
    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        if self.api_key.is_empty() {
            req
        } else {
            req.header("Authorization", format!("Bearer {}", self.api_key))
        }
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageBody>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageBody,
}

#[derive(Deserialize)]
struct MessageBody {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct UsageBody {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
}

impl UsageBody {
    fn into_usage(self) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens.unwrap_or(0),
            completion_tokens: self.completion_tokens.unwrap_or(0),
        }
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<UsageBody>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: DeltaBody,
}

#[derive(Deserialize, Default)]
struct DeltaBody {
    #[serde(default)]
    content: Option<String>,
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
impl ProtocolAdapter for OpenAiAdapter {
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
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({ "model": model, "messages": messages });
        debug!(url = %url, model, "openai chat request");

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

        let parsed: CompletionResponse =
            serde_json::from_str(&text).map_err(|e| AdapterError::Decode {
                message: e.to_string(),
                body: truncate(&text, 300),
            })?;

        // Some gateways answer 200 with an error envelope and no choices.
        let Some(choice) = parsed.choices.into_iter().next() else {
            if let Some(message) = super::error_message(&text) {
                return Err(AdapterError::Api {
                    status,
                    message,
                    body: truncate(&text, 300),
                });
            }
            return Err(AdapterError::Decode {
                message: "no choices in response".into(),
                body: truncate(&text, 300),
            });
        };

        Ok(ChatOutcome {
            content: choice.message.content.unwrap_or_default(),
            usage: parsed.usage.map(UsageBody::into_usage),
        })
    }

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<StreamOutcome, AdapterError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({ "model": model, "messages": messages, "stream": true });
        debug!(url = %url, model, "openai stream request");

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

        sse::collect_sse(resp, &watch, |payload| {
            let chunk: StreamChunk = serde_json::from_str(payload).ok()?;
            let text = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
                .unwrap_or_default();
            Some(SseDelta {
                text,
                usage: chunk.usage.map(UsageBody::into_usage),
            })
        })
        .await
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
    fn test_base_url_trailing_slash_stripped() {
        let adapter = OpenAiAdapter::new(Client::new(), "https://api.openai.com/v1/", "sk-test");
        assert_eq!(adapter.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_stream_chunk_parses_delta_and_usage() {
        let chunk: StreamChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":"hi"}}]}"#).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("hi"));

        let terminal: StreamChunk =
            serde_json::from_str(r#"{"choices":[],"usage":{"prompt_tokens":5,"completion_tokens":7}}"#)
                .unwrap();
        let usage = terminal.usage.unwrap().into_usage();
        assert_eq!(usage.prompt_tokens, 5);
        assert_eq!(usage.completion_tokens, 7);
    }
}
