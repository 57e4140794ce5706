//! Gemini-style protocol adapter.
//!
//! Auth rides in a `key` query parameter rather than a header; chat goes to
//! `POST {base}/models/{model}:generateContent`, streaming to
//! `:streamGenerateContent?alt=sse`, and the `assistant` role is spelled
//! `model`. Model names come back prefixed (`models/gemini-1.5-pro`).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::sse::{self, SseDelta};
use super::types::{ChatMessage, ChatOutcome, StreamOutcome, TokenUsage};
use super::{api_error, truncate, ProtocolAdapter};
use super::{CHAT_TIMEOUT, LIST_TIMEOUT, PING_TIMEOUT, STREAM_TIMEOUT};
use crate::error::AdapterError;
use crate::measure::Stopwatch;

pub struct GeminiAdapter {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiAdapter {
    pub fn new(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Translate protocol-neutral messages into Gemini `contents`.
    fn contents(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| {
                let role = if m.role == "assistant" {
                    "model"
                } else {
                    m.role.as_str()
                };
                json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect()
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(default, rename = "promptTokenCount")]
    prompt_token_count: Option<u32>,
    #[serde(default, rename = "candidatesTokenCount")]
    candidates_token_count: Option<u32>,
}

impl UsageMetadata {
    fn into_usage(self) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_token_count.unwrap_or(0),
            completion_tokens: self.candidates_token_count.unwrap_or(0),
        }
    }
}

impl GenerateResponse {
    /// Concatenated text of the first candidate's parts.
    fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| c.content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
}

// ── ProtocolAdapter implementation ──────────────────────────────────

#[async_trait]
impl ProtocolAdapter for GeminiAdapter {
    async fn ping(&self) -> Result<u16, AdapterError> {
        let url = format!("{}/models?key={}", self.base_url, self.api_key);
        let resp = self
            .client
            .get(&url)
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
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );
        let body = json!({ "contents": Self::contents(messages) });
        debug!(model, "gemini chat request");

        let resp = self
            .client
            .post(&url)
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

        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| AdapterError::Decode {
                message: e.to_string(),
                body: truncate(&text, 300),
            })?;
        if parsed.candidates.is_empty() {
            return Err(AdapterError::Decode {
                message: "no candidates in response".into(),
                body: truncate(&text, 300),
            });
        }

        Ok(ChatOutcome {
            content: parsed.text(),
            usage: parsed.usage_metadata.map(UsageMetadata::into_usage),
        })
    }

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<StreamOutcome, AdapterError> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, model, self.api_key
        );
        let body = json!({ "contents": Self::contents(messages) });
        debug!(model, "gemini stream request");

        let watch = Stopwatch::start();
        let resp = self
            .client
            .post(&url)
            .timeout(STREAM_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(e, STREAM_TIMEOUT))?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let text = resp.text().await.unwrap_or_default();
            return Err(api_error(status, &text));
        }

        // Stream chunks reuse the non-stream body shape; usageMetadata on a
        // chunk is cumulative, so the last one seen wins.
        sse::collect_sse(resp, &watch, |payload| {
            let chunk: GenerateResponse = serde_json::from_str(payload).ok()?;
            Some(SseDelta {
                text: chunk.text(),
                usage: chunk.usage_metadata.map(UsageMetadata::into_usage),
            })
        })
        .await
    }

    async fn list_models(&self) -> Result<Vec<String>, AdapterError> {
        let url = format!("{}/models?key={}", self.base_url, self.api_key);
        let resp = self
            .client
            .get(&url)
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

        // "models/gemini-1.5-pro" -> "gemini-1.5-pro"
        Ok(parsed
            .models
            .into_iter()
            .map(|m| {
                m.name
                    .rsplit('/')
                    .next()
                    .unwrap_or(m.name.as_str())
                    .to_string()
            })
            .collect())
    }
}
