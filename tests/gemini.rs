use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use video_insights::llm::{default_policy, GeminiProvider, LlmError, LlmProvider, ModelClient};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-flash-lite-latest";

fn endpoint() -> String {
    format!("/v1beta/models/{}:generateContent", MODEL)
}

fn reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }]
    })
}

fn provider(server: &MockServer) -> GeminiProvider {
    GeminiProvider::with_settings("test-key".to_string(), &server.uri(), Duration::from_secs(5))
}

#[tokio::test]
async fn sends_prompt_and_reads_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint()))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({ "contents": [{ "parts": [{ "text": "hi" }] }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("hello")))
        .expect(1)
        .mount(&server)
        .await;

    let text = provider(&server).generate(MODEL, "hi").await.unwrap();
    assert_eq!(text, "hello");
}

#[tokio::test]
async fn api_errors_carry_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint()))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT" }
        })))
        .mount(&server)
        .await;

    let err = provider(&server).generate(MODEL, "hi").await.unwrap_err();
    assert_eq!(
        err,
        LlmError::ApiError {
            status: 400,
            message: "API key not valid".to_string()
        }
    );
}

#[tokio::test]
async fn missing_candidates_is_an_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let err = provider(&server).generate(MODEL, "hi").await.unwrap_err();
    assert_eq!(err, LlmError::EmptyResponse);
}

#[tokio::test]
async fn client_retries_rate_limits_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint()))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "code": 429, "message": "Resource has been exhausted" }
        })))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(endpoint()))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("{\"title\":\"T\"}")))
        .expect(1)
        .mount(&server)
        .await;

    let client = ModelClient::new(Arc::new(provider(&server))).with_policy(default_policy(3, Duration::ZERO));
    let reply = client.call(MODEL, "extract").await.unwrap();
    assert_eq!(reply.text, "{\"title\":\"T\"}");
}

#[tokio::test]
async fn client_gives_up_on_non_transient_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint()))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "Permission denied" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ModelClient::new(Arc::new(provider(&server))).with_policy(default_policy(3, Duration::ZERO));
    let err = client.call(MODEL, "extract").await.unwrap_err();
    assert!(err.to_string().starts_with("Model API error:"));
    assert!(err.to_string().contains("Permission denied"));
}
