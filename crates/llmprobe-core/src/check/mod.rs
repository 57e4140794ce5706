//! Check orchestrator: runs the fixed battery against one configuration.
//!
//! The battery is connectivity → chat → stream → models → multi_turn, always
//! in that order and always sequential, since items are timed individually and
//! parallel probes would contaminate each other's latency. Items are
//! independent probes, not a dependency chain: a provider may reject the
//! cheap reachability call yet serve chat fine, so one failure never skips
//! the rest. The single exception is `multi_turn`, which reuses the chat
//! path and is skipped when single-turn chat already failed.

pub mod report;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::error::{AdapterError, ConfigError};
use crate::measure::Stopwatch;
use crate::protocol::types::ChatMessage;
use crate::protocol::{adapter_for, truncate, ProtocolAdapter, ProtocolKind};

const CHAT_PROBE_PROMPT: &str = "Hi, reply with exactly: OK";
const STREAM_PROBE_PROMPT: &str = "Count from 1 to 5";
const MULTI_TURN_PROMPT: &str = "Remember this number: 42. Just reply OK.";
const MULTI_TURN_FOLLOW_UP: &str = "What number did I ask you to remember?";

const TIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// One item of the check battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckItem {
    Connectivity,
    Chat,
    Stream,
    Models,
    MultiTurn,
}

impl CheckItem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connectivity => "connectivity",
            Self::Chat => "chat",
            Self::Stream => "stream",
            Self::Models => "models",
            Self::MultiTurn => "multi_turn",
        }
    }
}

impl fmt::Display for CheckItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Status of one check item.
///
/// `Pending` and `Running` belong to the shell's live-progress display; a
/// completed run only ever contains `Success`, `Failed` or `Warning`.
/// `Warning` marks a check that completed but looks suspicious (empty model
/// list, zero-chunk stream, unreported usage), triaged differently from a
/// network or protocol failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pending,
    Running,
    Success,
    Failed,
    Warning,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Warning => "warning",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Outcome of one check item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub item: CheckItem,
    pub status: CheckStatus,
    #[serde(rename = "latency")]
    pub latency_ms: u64,
    #[serde(rename = "ttft")]
    pub ttft_ms: u64,
    pub message: String,
    pub detail: String,
    #[serde(rename = "tokenIn")]
    pub token_in: u32,
    #[serde(rename = "tokenOut")]
    pub token_out: u32,
}

impl CheckResult {
    pub(crate) fn begin(item: CheckItem) -> Self {
        Self {
            item,
            status: CheckStatus::Failed,
            latency_ms: 0,
            ttft_ms: 0,
            message: String::new(),
            detail: String::new(),
            token_in: 0,
            token_out: 0,
        }
    }

    fn fail(&mut self, err: &AdapterError) {
        self.status = CheckStatus::Failed;
        self.message = err.summary();
        self.detail = err.detail();
    }
}

/// One endpoint plus credential to probe. Built by the caller, used for
/// exactly one run, never cached by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    #[serde(rename = "providerID")]
    pub provider_id: String,
    #[serde(rename = "providerName")]
    pub provider_name: String,
    #[serde(rename = "baseURL")]
    pub base_url: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
    pub model: String,
    pub protocol: ProtocolKind,
}

/// Aggregate result of one full battery run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullCheckResult {
    #[serde(rename = "providerID")]
    pub provider_id: String,
    #[serde(rename = "providerName")]
    pub provider_name: String,
    #[serde(rename = "baseURL")]
    pub base_url: String,
    pub model: String,
    pub protocol: ProtocolKind,
    /// One entry per attempted item, in battery order.
    pub results: Vec<CheckResult>,
    #[serde(rename = "modelList")]
    pub model_list: Vec<String>,
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(rename = "endTime")]
    pub end_time: String,
    /// Wall time of the whole run, not the sum of item latencies.
    #[serde(rename = "totalLatency")]
    pub total_latency_ms: u64,
}

pub(crate) fn now_string() -> String {
    chrono::Local::now().format(TIME_FMT).to_string()
}

/// The check engine. Cheap to clone a `reqwest::Client` into; all state is
/// the shared connection pool.
pub struct Checker {
    client: reqwest::Client,
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Use a caller-supplied client (custom TLS, proxy, ...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Run the full battery against one configuration.
    ///
    /// The only hard error is a [`ConfigError`], raised before any network
    /// activity. Every runtime failure is absorbed into the corresponding
    /// item's [`CheckResult`]; the returned aggregate is always complete.
    pub async fn run_check(&self, config: &CheckConfig) -> Result<FullCheckResult, ConfigError> {
        validate_base_url(&config.base_url)?;

        let adapter = adapter_for(
            config.protocol,
            self.client.clone(),
            &config.base_url,
            &config.api_key,
        );

        info!(
            provider = %config.provider_id,
            protocol = %config.protocol,
            model = %config.model,
            "Running check battery"
        );

        let watch = Stopwatch::start();
        let start_time = now_string();
        let mut results = Vec::with_capacity(5);

        results.push(self.check_connectivity(adapter.as_ref()).await);

        let chat = self.check_chat(adapter.as_ref(), &config.model).await;
        let chat_ok = chat.status != CheckStatus::Failed;
        results.push(chat);

        results.push(self.check_stream(adapter.as_ref(), &config.model).await);

        let (models, model_list) = self.check_models(adapter.as_ref()).await;
        results.push(models);

        results.push(if chat_ok {
            self.check_multi_turn(adapter.as_ref(), &config.model).await
        } else {
            let mut r = CheckResult::begin(CheckItem::MultiTurn);
            r.message = "skipped: chat unavailable".into();
            r
        });

        for r in &results {
            debug!(item = %r.item, status = %r.status, latency_ms = r.latency_ms, "Item finished");
        }

        Ok(FullCheckResult {
            provider_id: config.provider_id.clone(),
            provider_name: config.provider_name.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            protocol: config.protocol,
            results,
            model_list,
            start_time,
            end_time: now_string(),
            total_latency_ms: watch.elapsed_ms(),
        })
    }

    async fn check_connectivity(&self, adapter: &dyn ProtocolAdapter) -> CheckResult {
        let watch = Stopwatch::start();
        let mut r = CheckResult::begin(CheckItem::Connectivity);

        match adapter.ping().await {
            Err(err) => {
                r.latency_ms = watch.elapsed_ms();
                r.message = match err {
                    AdapterError::Timeout(_) => err.summary(),
                    _ => "network unreachable".into(),
                };
                r.detail = err.detail();
            }
            Ok(code) => {
                r.latency_ms = watch.elapsed_ms();
                match code {
                    401 | 403 => {
                        r.status = CheckStatus::Warning;
                        r.message = format!("reachable, auth rejected (HTTP {code})");
                        r.detail = "check the API key".into();
                    }
                    200..=499 => {
                        r.status = CheckStatus::Success;
                        r.message = format!("endpoint reachable (HTTP {code})");
                    }
                    _ => {
                        r.message = format!("server error (HTTP {code})");
                    }
                }
            }
        }
        r
    }

    async fn check_chat(&self, adapter: &dyn ProtocolAdapter, model: &str) -> CheckResult {
        let watch = Stopwatch::start();
        let mut r = CheckResult::begin(CheckItem::Chat);
        let messages = [ChatMessage::user(CHAT_PROBE_PROMPT)];

        match adapter.chat(model, &messages).await {
            Err(err) => r.fail(&err),
            Ok(outcome) => {
                match outcome.usage {
                    Some(usage) => {
                        r.status = CheckStatus::Success;
                        r.message = "chat completed".into();
                        r.token_in = usage.prompt_tokens;
                        r.token_out = usage.completion_tokens;
                    }
                    None => {
                        r.status = CheckStatus::Warning;
                        r.message = "chat completed, token usage unreported".into();
                    }
                }
                r.detail = truncate(&outcome.content, 100);
            }
        }
        r.latency_ms = watch.elapsed_ms();
        r
    }

    async fn check_stream(&self, adapter: &dyn ProtocolAdapter, model: &str) -> CheckResult {
        let watch = Stopwatch::start();
        let mut r = CheckResult::begin(CheckItem::Stream);
        let messages = [ChatMessage::user(STREAM_PROBE_PROMPT)];

        match adapter.chat_stream(model, &messages).await {
            Err(err) => r.fail(&err),
            Ok(outcome) => {
                r.ttft_ms = outcome.ttft_ms;
                if outcome.chunk_count == 0 {
                    r.status = CheckStatus::Warning;
                    r.message = "stream completed with no chunks".into();
                } else {
                    r.status = CheckStatus::Success;
                    r.message = format!("streaming ok, {} chunks", outcome.chunk_count);
                    r.detail = truncate(&outcome.content, 100);
                    if let Some(usage) = outcome.usage {
                        r.token_in = usage.prompt_tokens;
                        r.token_out = usage.completion_tokens;
                    }
                }
            }
        }
        r.latency_ms = watch.elapsed_ms();
        r
    }

    async fn check_models(&self, adapter: &dyn ProtocolAdapter) -> (CheckResult, Vec<String>) {
        let watch = Stopwatch::start();
        let mut r = CheckResult::begin(CheckItem::Models);

        // Listing is a nicety; several deployments simply do not expose it,
        // so trouble here is a warning, never a battery failure.
        let model_list = match adapter.list_models().await {
            Err(err) => {
                r.status = CheckStatus::Warning;
                r.message = "model listing unavailable".into();
                r.detail = err.detail();
                Vec::new()
            }
            Ok(models) if models.is_empty() => {
                r.status = CheckStatus::Warning;
                r.message = "model list empty".into();
                models
            }
            Ok(models) => {
                r.status = CheckStatus::Success;
                r.message = format!("{} models listed", models.len());
                r.detail = if models.len() > 5 {
                    format!("{}...", models[..5].join(", "))
                } else {
                    models.join(", ")
                };
                models
            }
        };
        r.latency_ms = watch.elapsed_ms();
        (r, model_list)
    }

    async fn check_multi_turn(&self, adapter: &dyn ProtocolAdapter, model: &str) -> CheckResult {
        let watch = Stopwatch::start();
        let mut r = CheckResult::begin(CheckItem::MultiTurn);

        let first = match adapter
            .chat(model, &[ChatMessage::user(MULTI_TURN_PROMPT)])
            .await
        {
            Err(err) => {
                r.message = "first turn failed".into();
                r.detail = err.detail();
                r.latency_ms = watch.elapsed_ms();
                return r;
            }
            Ok(outcome) => outcome,
        };

        let history = [
            ChatMessage::user(MULTI_TURN_PROMPT),
            ChatMessage::assistant(&first.content),
            ChatMessage::user(MULTI_TURN_FOLLOW_UP),
        ];
        let second = match adapter.chat(model, &history).await {
            Err(err) => {
                r.message = "second turn failed".into();
                r.detail = err.detail();
                r.latency_ms = watch.elapsed_ms();
                return r;
            }
            Ok(outcome) => outcome,
        };
        r.latency_ms = watch.elapsed_ms();

        // Structural check: the context was accepted and answered. Whether
        // the model actually recalled the number only decides success vs.
        // warning.
        if second.content.contains("42") {
            r.status = CheckStatus::Success;
            r.message = "context preserved across turns".into();
        } else {
            r.status = CheckStatus::Warning;
            r.message = "completed, context may be lost".into();
        }
        r.detail = format!(
            "turn 1: {} | turn 2: {}",
            truncate(&first.content, 50),
            truncate(&second.content, 50)
        );

        let usage1 = first.usage.unwrap_or_default();
        let usage2 = second.usage.unwrap_or_default();
        r.token_in = usage1.prompt_tokens + usage2.prompt_tokens;
        r.token_out = usage1.completion_tokens + usage2.completion_tokens;
        r
    }
}

fn validate_base_url(raw: &str) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(raw).map_err(|e| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_serde_names() {
        assert_eq!(
            serde_json::to_string(&CheckItem::MultiTurn).unwrap(),
            "\"multi_turn\""
        );
        assert_eq!(
            serde_json::to_string(&CheckItem::Connectivity).unwrap(),
            "\"connectivity\""
        );
    }

    #[test]
    fn test_status_serde_names() {
        assert_eq!(
            serde_json::to_string(&CheckStatus::Warning).unwrap(),
            "\"warning\""
        );
    }

    #[test]
    fn test_config_wire_field_names() {
        let config = CheckConfig {
            provider_id: "openai".into(),
            provider_name: "OpenAI".into(),
            base_url: "https://api.openai.com/v1".into(),
            api_key: "sk-test".into(),
            model: "gpt-4o".into(),
            protocol: ProtocolKind::Openai,
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["providerID"], "openai");
        assert_eq!(json["baseURL"], "https://api.openai.com/v1");
        assert_eq!(json["apiKey"], "sk-test");
        assert_eq!(json["protocol"], "openai");
    }

    #[test]
    fn test_validate_base_url() {
        assert!(validate_base_url("https://api.openai.com/v1").is_ok());
        assert!(validate_base_url("http://localhost:11434/v1").is_ok());
        assert!(validate_base_url("not a url").is_err());
        assert!(validate_base_url("ftp://example.com").is_err());
    }

    #[tokio::test]
    async fn test_invalid_base_url_fails_before_io() {
        let checker = Checker::new();
        let config = CheckConfig {
            provider_id: "broken".into(),
            provider_name: "Broken".into(),
            base_url: "nonsense".into(),
            api_key: String::new(),
            model: "m".into(),
            protocol: ProtocolKind::Openai,
        };
        let err = checker.run_check(&config).await.unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    }
}
