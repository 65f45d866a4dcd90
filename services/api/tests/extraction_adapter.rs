//! The Gemini adapter against a mocked OpenAI-compatible endpoint.

use api_lib::adapters::GeminiExtractionAdapter;
use chrono::NaiveDate;
use register_assistant_core::{
    ExtractionGateway, ExtractionService, PipelineError, PortError, ServiceErrorKind,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-test";

fn adapter(server: &MockServer) -> GeminiExtractionAdapter {
    GeminiExtractionAdapter::from_credentials("test-key", &server.uri(), MODEL.to_string())
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1_760_400_000,
        "model": MODEL,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

fn provider_error(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": {
            "message": message,
            "type": "invalid_request_error",
            "param": null,
            "code": null
        }
    }))
}

#[tokio::test]
async fn sends_the_image_and_returns_the_model_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": MODEL,
            "n": 1,
            "temperature": 0.5,
            "response_format": { "type": "json_object" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("[{\"Name\":\"Ravi\"}]")))
        .expect(1)
        .mount(&server)
        .await;

    let text = adapter(&server)
        .extract_records(&[0xff, 0xd8, 0xff], "image/jpeg", "Read the register.")
        .await
        .unwrap();
    assert_eq!(text, "[{\"Name\":\"Ravi\"}]");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let parts = body["messages"][0]["content"].as_array().unwrap();
    assert_eq!(parts[0]["type"], "image_url");
    assert_eq!(parts[0]["image_url"]["url"], "data:image/jpeg;base64,/9j/");
    assert_eq!(parts[1]["type"], "text");
    assert_eq!(parts[1]["text"], "Read the register.");
}

#[tokio::test]
async fn invalid_key_is_reported_as_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(provider_error(400, "API key not valid. Please pass a valid API key."))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .extract_records(b"img", "image/png", "prompt")
        .await
        .unwrap_err();
    match err {
        PortError::Unauthorized(message) => assert!(message.starts_with("API key not valid")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn exhausted_quota_is_reported_as_such() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(provider_error(403, "You exceeded your current quota."))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .extract_records(b"img", "image/png", "prompt")
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::QuotaExceeded(_)));
}

#[tokio::test]
async fn gateway_parses_and_classifies_through_the_adapter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "```json\n[{\"Name\":\"Asha\",\"Class\":\"9-A\"}]\n```",
        )))
        .mount(&server)
        .await;

    let today = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
    let gateway = ExtractionGateway::new(Arc::new(adapter(&server)));
    let records = gateway
        .extract(b"img", "image/png", None, today)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "Asha");
    assert_eq!(records[0].class_name, "9-A");
    assert_eq!(records[0].roll_number, "001");

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(provider_error(400, "API key not valid."))
        .mount(&server)
        .await;

    let err = gateway
        .extract_raw(b"img", "image/png", Some("custom"), today)
        .await
        .unwrap_err();
    match err {
        PipelineError::Service { kind, message } => {
            assert_eq!(kind, ServiceErrorKind::Auth);
            assert_eq!(message, "API key not valid.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
