//! Full-battery contract tests against mock servers.
//!
//! Each protocol gets a wiremock backend answering all endpoints minimally;
//! the battery must come back green, in order, with sane timing fields.
//! Failure-path tests verify that items are independent probes and that
//! multi_turn is the only item gated on another.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use llmprobe_core::check::{CheckConfig, CheckItem, CheckStatus, Checker};
use llmprobe_core::protocol::ProtocolKind;

const BATTERY: [CheckItem; 5] = [
    CheckItem::Connectivity,
    CheckItem::Chat,
    CheckItem::Stream,
    CheckItem::Models,
    CheckItem::MultiTurn,
];

const OPENAI_STREAM_BODY: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"content\":\"1 2 3\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\" 4 5\"}}]}\n\n",
    "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":5,\"completion_tokens\":7}}\n\n",
    "data: [DONE]\n\n",
);

const ANTHROPIC_STREAM_BODY: &str = concat!(
    "data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":9}}}\n\n",
    "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"1 2 3\"}}\n\n",
    "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\" 4 5\"}}\n\n",
    "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":6}}\n\n",
);

const GEMINI_STREAM_BODY: &str = concat!(
    "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"1 2 3\"}]}}]}\n\n",
    "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\" 4 5\"}]}}],",
    "\"usageMetadata\":{\"promptTokenCount\":5,\"candidatesTokenCount\":7}}\n\n",
);

fn config_for(server: &MockServer, protocol: ProtocolKind, model: &str) -> CheckConfig {
    CheckConfig {
        provider_id: "test".into(),
        provider_name: "Test Provider".into(),
        base_url: server.uri(),
        api_key: "test-key".into(),
        model: model.into(),
        protocol,
    }
}

fn assert_battery_order(results: &[llmprobe_core::check::CheckResult]) {
    let items: Vec<CheckItem> = results.iter().map(|r| r.item).collect();
    assert_eq!(items, BATTERY);
}

async fn mount_openai_ok(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "gpt-4o"}, {"id": "gpt-4o-mini"}]
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(OPENAI_STREAM_BODY, "text/event-stream")
                .set_delay(Duration::from_millis(20)),
        )
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "OK, the number is 42"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 6}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn openai_full_battery_succeeds() {
    let server = MockServer::start().await;
    mount_openai_ok(&server).await;

    let checker = Checker::new();
    let result = checker
        .run_check(&config_for(&server, ProtocolKind::Openai, "gpt-4o"))
        .await
        .unwrap();

    assert_battery_order(&result.results);
    for item in &result.results {
        assert_eq!(
            item.status,
            CheckStatus::Success,
            "{} was not success: {} / {}",
            item.item,
            item.message,
            item.detail
        );
    }
    assert_eq!(result.model_list, vec!["gpt-4o", "gpt-4o-mini"]);

    let chat = &result.results[1];
    assert_eq!(chat.token_in, 12);
    assert_eq!(chat.token_out, 6);

    let stream = &result.results[2];
    assert_eq!(stream.token_in, 5);
    assert_eq!(stream.token_out, 7);
}

#[tokio::test]
async fn anthropic_full_battery_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "claude-sonnet-4-20250514"}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(ANTHROPIC_STREAM_BODY, "text/event-stream")
                .set_delay(Duration::from_millis(20)),
        )
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "test-key"))
        .and(body_partial_json(json!({"max_tokens": 256})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "OK, the number is 42"}],
            "usage": {"input_tokens": 10, "output_tokens": 8}
        })))
        .mount(&server)
        .await;

    let checker = Checker::new();
    let result = checker
        .run_check(&config_for(
            &server,
            ProtocolKind::Anthropic,
            "claude-sonnet-4-20250514",
        ))
        .await
        .unwrap();

    assert_battery_order(&result.results);
    for item in &result.results {
        assert_eq!(
            item.status,
            CheckStatus::Success,
            "{} was not success: {} / {}",
            item.item,
            item.message,
            item.detail
        );
    }
    assert_eq!(result.model_list, vec!["claude-sonnet-4-20250514"]);

    // Usage stitched together from message_start and message_delta.
    let stream = &result.results[2];
    assert_eq!(stream.token_in, 9);
    assert_eq!(stream.token_out, 6);
}

#[tokio::test]
async fn gemini_full_battery_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {"name": "models/gemini-2.0-flash"},
                {"name": "models/gemini-1.5-pro"}
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "The number is 42"}], "role": "model"}}],
            "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 5}
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .and(query_param("key", "test-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(GEMINI_STREAM_BODY, "text/event-stream")
                .set_delay(Duration::from_millis(20)),
        )
        .mount(&server)
        .await;

    let checker = Checker::new();
    let result = checker
        .run_check(&config_for(&server, ProtocolKind::Gemini, "gemini-2.0-flash"))
        .await
        .unwrap();

    assert_battery_order(&result.results);
    for item in &result.results {
        assert_eq!(
            item.status,
            CheckStatus::Success,
            "{} was not success: {} / {}",
            item.item,
            item.message,
            item.detail
        );
    }
    // Listing strips the "models/" prefix.
    assert_eq!(
        result.model_list,
        vec!["gemini-2.0-flash", "gemini-1.5-pro"]
    );
}

#[tokio::test]
async fn chat_failure_skips_only_multi_turn() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "gpt-4o"}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(OPENAI_STREAM_BODY, "text/event-stream"),
        )
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "upstream exploded"}
        })))
        .mount(&server)
        .await;

    let checker = Checker::new();
    let result = checker
        .run_check(&config_for(&server, ProtocolKind::Openai, "gpt-4o"))
        .await
        .unwrap();

    assert_battery_order(&result.results);
    assert_eq!(result.results[0].status, CheckStatus::Success);

    let chat = &result.results[1];
    assert_eq!(chat.status, CheckStatus::Failed);
    assert_eq!(chat.message, "upstream exploded");

    // Stream and models are independent probes and must be unaffected.
    assert_eq!(result.results[2].status, CheckStatus::Success);
    assert_eq!(result.results[3].status, CheckStatus::Success);

    let multi_turn = &result.results[4];
    assert_eq!(multi_turn.status, CheckStatus::Failed);
    assert_eq!(multi_turn.message, "skipped: chat unavailable");
}

#[tokio::test]
async fn stream_ttft_bounded_by_latency() {
    let server = MockServer::start().await;
    mount_openai_ok(&server).await;

    let checker = Checker::new();
    let result = checker
        .run_check(&config_for(&server, ProtocolKind::Openai, "gpt-4o"))
        .await
        .unwrap();

    let stream = &result.results[2];
    assert_eq!(stream.status, CheckStatus::Success);
    assert!(stream.ttft_ms >= 1, "chunks arrived, ttft must be non-zero");
    assert!(
        stream.ttft_ms <= stream.latency_ms,
        "ttft {} must not exceed latency {}",
        stream.ttft_ms,
        stream.latency_ms
    );
}

#[tokio::test]
async fn zero_chunk_stream_is_a_warning() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "gpt-4o"}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw("data: [DONE]\n\n", "text/event-stream"))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "42"}}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1}
        })))
        .mount(&server)
        .await;

    let checker = Checker::new();
    let result = checker
        .run_check(&config_for(&server, ProtocolKind::Openai, "gpt-4o"))
        .await
        .unwrap();

    let stream = &result.results[2];
    assert_eq!(stream.status, CheckStatus::Warning);
    assert_eq!(stream.ttft_ms, 0);
    assert_eq!(stream.message, "stream completed with no chunks");
}

#[tokio::test]
async fn repeated_runs_are_deterministic() {
    let server = MockServer::start().await;
    mount_openai_ok(&server).await;

    let checker = Checker::new();
    let config = config_for(&server, ProtocolKind::Openai, "gpt-4o");
    let first = checker.run_check(&config).await.unwrap();
    let second = checker.run_check(&config).await.unwrap();

    assert_eq!(first.results.len(), second.results.len());
    for (a, b) in first.results.iter().zip(second.results.iter()) {
        assert_eq!(a.item, b.item);
        assert_eq!(a.status, b.status);
        assert_eq!(a.message, b.message);
    }
}
