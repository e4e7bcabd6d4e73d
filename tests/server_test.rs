//! End-to-end tests of the REST API against a scripted engine

mod common;

use common::{start_test_server, MockEngine};
use lehrbot_core::config::ConfigManager;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

#[tokio::test]
async fn test_chat_returns_reply_with_engine_token_count() {
    let engine = Arc::new(MockEngine::new("Alles richtig! Jetzt eine neue Übung.").with_tokens(7));
    let server = start_test_server(engine.clone(), ConfigManager::from_defaults(), true).await;

    let response = client()
        .post(server.url("/api/v1/chat"))
        .json(&json!({"message": "Kunde: Ich möchte ein Brot.", "max_tokens": 32}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-process-time"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["response"], "Alles richtig! Jetzt eine neue Übung.");
    assert_eq!(body["cached"], false);
    assert_eq!(body["tokens_generated"], 7);
    assert_eq!(body["model_info"]["model_loaded"], true);
    assert_eq!(body["model_info"]["device"], "cpu");
    assert!(body["response_time"].as_f64().unwrap() >= 0.0);

    let calls = engine.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    let (messages, params) = &calls[0];
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "system");
    assert_eq!(messages[0].content, ConfigManager::from_defaults().system_prompt());
    assert_eq!(messages[1].role, "user");
    assert_eq!(messages[1].content, "Kunde: Ich möchte ein Brot.");
    assert_eq!(params.max_tokens, 32);
    assert!(!params.do_sample);

    server.stop().await;
}

#[tokio::test]
async fn test_chat_counts_words_without_engine_token_count() {
    let engine = Arc::new(MockEngine::new("Sehr gut gemacht"));
    let server = start_test_server(engine, ConfigManager::from_defaults(), true).await;

    let body: Value = client()
        .post(server.url("/api/v1/chat"))
        .json(&json!({"message": "Hallo"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["tokens_generated"], 3);

    let stats: Value = client()
        .get(server.url("/api/v1/cache/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["cache_misses"], 1);
    assert_eq!(stats["total_requests"], 1);
    assert_eq!(stats["cache_hits"], 0);
    assert_eq!(stats["hit_rate"], 0.0);

    let cleared = client().post(server.url("/api/v1/cache/clear")).send().await.unwrap();
    assert_eq!(cleared.status(), StatusCode::OK);
    let message: Value = cleared.json().await.unwrap();
    assert_eq!(message["message"], "Cache cleared successfully");

    let stats: Value = client()
        .get(server.url("/api/v1/cache/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total_requests"], 0);

    server.stop().await;
}

#[tokio::test]
async fn test_chat_rejects_invalid_requests() {
    let engine = Arc::new(MockEngine::new("unused"));
    let server = start_test_server(engine.clone(), ConfigManager::from_defaults(), true).await;

    let invalid = [
        json!({"message": ""}),
        json!({"message": "x".repeat(1001)}),
        json!({"message": "Hallo", "max_tokens": 0}),
        json!({"message": "Hallo", "max_tokens": 1001}),
        json!({"message": "Hallo", "temperature": 2.5}),
        json!({"message": "Hallo", "top_p": -0.1}),
        json!({"max_tokens": 10}),
    ];

    for payload in invalid {
        let response = client()
            .post(server.url("/api/v1/chat"))
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "payload {}", payload);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error_type"], "ValidationError");
        assert_eq!(body["request_id"].as_str().unwrap().len(), 8);
    }

    let malformed = client()
        .post(server.url("/api/v1/chat"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(engine.call_count(), 0);
    server.stop().await;
}

#[tokio::test]
async fn test_chat_engine_failure_is_internal_error() {
    let engine = Arc::new(MockEngine::failing());
    let server = start_test_server(engine, ConfigManager::from_defaults(), true).await;

    let response = client()
        .post(server.url("/api/v1/chat"))
        .json(&json!({"message": "Hallo"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Internal server error");

    let stats: Value = client()
        .get(server.url("/api/v1/cache/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total_requests"], 0);

    server.stop().await;
}

#[tokio::test]
async fn test_unloaded_model_is_unavailable() {
    let engine = Arc::new(MockEngine::new("unused"));
    let server = start_test_server(engine.clone(), ConfigManager::from_defaults(), false).await;

    let response = client()
        .post(server.url("/api/v1/chat"))
        .json(&json!({"message": "Hallo"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Model not loaded");

    let ready = client().get(server.url("/api/v1/ready")).send().await.unwrap();
    assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE);

    let health: Value = client()
        .get(server.url("/api/v1/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["model_loaded"], false);

    assert_eq!(engine.call_count(), 0);
    server.stop().await;
}

#[tokio::test]
async fn test_probes_and_status() {
    let engine = Arc::new(MockEngine::new("Gut").with_tokens(1));
    let server = start_test_server(engine, ConfigManager::from_defaults(), true).await;

    let health: Value = client()
        .get(server.url("/api/v1/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["model_loaded"], true);
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
    assert!(health["timestamp"].is_string());
    assert!(health["uptime"].as_f64().unwrap() >= 0.0);

    let ready: Value = client()
        .get(server.url("/api/v1/ready"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ready["status"], "ready");

    let live: Value = client()
        .get(server.url("/api/v1/live"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(live["status"], "alive");

    client()
        .post(server.url("/api/v1/chat"))
        .json(&json!({"message": "Hallo"}))
        .send()
        .await
        .unwrap();

    let status: Value = client()
        .get(server.url("/api/v1/model/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["model_loaded"], true);
    assert_eq!(status["tokenizer_loaded"], true);
    assert_eq!(status["total_inferences"], 1);
    assert_eq!(status["total_tokens_generated"], 1);
    assert_eq!(status["device"], "cpu");
    assert_eq!(server.manager.get_model_status().total_inferences, 1);

    server.stop().await;
}

#[tokio::test]
async fn test_root_and_config() {
    let engine = Arc::new(MockEngine::new("unused"));
    let server = start_test_server(engine, ConfigManager::from_defaults(), true).await;

    let root: Value = client().get(server.url("/")).send().await.unwrap().json().await.unwrap();
    assert_eq!(root["name"], "German Language Teaching Chatbot");
    assert_eq!(root["health"], "/api/v1/health");
    assert_eq!(root["model_status"], "/api/v1/model/status");

    let config: Value = client()
        .get(server.url("/api/v1/config"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(config["model"]["max_tokens"], 256);
    assert_eq!(config["server"]["port"], 8000);
    assert_eq!(config["optimization"]["quantization"], "q4_k_m");
    assert!(config.get("openai").is_none());
    assert!(config.get("system_prompt").is_none());

    let missing = client().get(server.url("/api/v1/nope")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    server.stop().await;
}

#[tokio::test]
async fn test_untrusted_host_is_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("app_config.yaml"),
        "server:\n  trusted_hosts:\n    - 127.0.0.1\n    - \"*.lehrbot.de\"\n",
    )
    .unwrap();
    let config = ConfigManager::load(dir.path());
    assert_eq!(config.server_config().trusted_hosts.len(), 2);

    let engine = Arc::new(MockEngine::new("unused"));
    let server = start_test_server(engine, config, true).await;

    let allowed = client().get(server.url("/api/v1/live")).send().await.unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);

    let subdomain = client()
        .get(server.url("/api/v1/live"))
        .header(reqwest::header::HOST, "api.lehrbot.de")
        .send()
        .await
        .unwrap();
    assert_eq!(subdomain.status(), StatusCode::OK);

    let rejected = client()
        .get(server.url("/api/v1/live"))
        .header(reqwest::header::HOST, "evil.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
    let body: Value = rejected.json().await.unwrap();
    assert_eq!(body["error_type"], "TrustedHostError");

    server.stop().await;
}

#[tokio::test]
async fn test_cors_echoes_origin_with_credentials() {
    let engine = Arc::new(MockEngine::new("unused"));
    let server = start_test_server(engine, ConfigManager::from_defaults(), true).await;

    let response = client()
        .get(server.url("/api/v1/live"))
        .header(reqwest::header::ORIGIN, "http://localhost:3000")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );
    assert_eq!(response.headers()["access-control-allow-credentials"], "true");

    server.stop().await;
}

#[tokio::test]
async fn test_slow_generation_times_out() {
    let mut config = ConfigManager::from_defaults();
    config.set("server.request_timeout_secs", 1i64).unwrap();
    assert_eq!(config.server_config().request_timeout_secs, 1);

    let engine = Arc::new(MockEngine::new("zu spät").with_delay(Duration::from_secs(5)));
    let server = start_test_server(engine.clone(), config, true).await;

    let response = client()
        .post(server.url("/api/v1/chat"))
        .json(&json!({"message": "Hallo"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(engine.call_count(), 1);

    let stats: Value = client()
        .get(server.url("/api/v1/cache/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total_requests"], 0);

    server.stop().await;
}
