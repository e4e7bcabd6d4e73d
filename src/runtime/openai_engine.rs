//! OpenAI chat completions backend

use crate::config::OpenAiConfig;
use crate::error::{Error, Result};
use crate::runtime::template_engine::ChatMessage;
use crate::runtime::{ChatEngine, FinishReason, Generation, GenerationParams};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    top_p: f64,
    max_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    completion_tokens: usize,
}

/// Remote engine calling `{api_base}/chat/completions`
pub struct OpenAiEngine {
    config: OpenAiConfig,
    client: Client,
    api_key: RwLock<Option<String>>,
}

impl OpenAiEngine {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(project) = config.project.as_deref().filter(|p| !p.is_empty()) {
            let value = header::HeaderValue::from_str(project)
                .map_err(|e| Error::Config(format!("invalid openai.project: {}", e)))?;
            headers.insert("OpenAI-Project", value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            api_key: RwLock::new(None),
        })
    }

    /// Use an explicit key instead of `OPENAI_API_KEY`
    pub fn with_api_key(self, key: impl Into<String>) -> Self {
        *self.api_key.write() = Some(key.into());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatEngine for OpenAiEngine {
    fn name(&self) -> &str {
        "openai"
    }

    async fn load(&self) -> Result<()> {
        if self.api_key.read().is_some() {
            return Ok(());
        }

        // A missing .env file is fine; the variable may come from the environment
        let _ = dotenvy::dotenv();
        let key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config(format!("{} is not set", API_KEY_VAR)))?;

        *self.api_key.write() = Some(key);
        info!(model = %self.config.model, api_base = %self.config.api_base, "OpenAI backend ready");
        Ok(())
    }

    async fn unload(&self) -> Result<()> {
        *self.api_key.write() = None;
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.api_key.read().is_some()
    }

    fn tokenizer_loaded(&self) -> bool {
        self.is_loaded()
    }

    fn device(&self) -> String {
        "remote".to_string()
    }

    fn memory_bytes(&self) -> u64 {
        0
    }

    async fn generate(&self, messages: &[ChatMessage], params: &GenerationParams) -> Result<Generation> {
        let key = self.api_key.read().clone().ok_or(Error::ModelNotLoaded)?;

        let body = CompletionRequest {
            model: &self.config.model,
            messages,
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_tokens,
        };

        debug!(model = %self.config.model, messages = messages.len(), "Sending chat completion");
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::RemoteApi(format!("{}: {}", status, detail)));
        }

        let completion: CompletionResponse = response.json().await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::RemoteApi("response has no choices".to_string()))?;

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("length") => FinishReason::MaxTokens,
            _ => FinishReason::Stop,
        };

        Ok(Generation {
            text: choice.message.content.unwrap_or_default().trim().to_string(),
            tokens_generated: completion.usage.map(|u| u.completion_tokens),
            finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn serve(reply: Value) -> String {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move |Json(_body): Json<Value>| {
                let reply = reply.clone();
                async move { Json(reply) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    fn engine(api_base: String) -> OpenAiEngine {
        let config = OpenAiConfig {
            api_base,
            ..OpenAiConfig::default()
        };
        OpenAiEngine::new(config).unwrap().with_api_key("sk-test")
    }

    #[tokio::test]
    async fn test_reply_is_trimmed_with_usage() {
        let base = serve(json!({
            "choices": [{"message": {"role": "assistant", "content": "  Gut gemacht!\n"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}
        }))
        .await;

        let engine = engine(base);
        assert!(engine.is_loaded());
        let generation = engine
            .generate(&[ChatMessage::user("Hallo")], &GenerationParams::default())
            .await
            .unwrap();
        assert_eq!(generation.text, "Gut gemacht!");
        assert_eq!(generation.tokens_generated, Some(4));
        assert_eq!(generation.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn test_null_content_becomes_empty() {
        let base = serve(json!({
            "choices": [{"message": {"role": "assistant", "content": null}, "finish_reason": "length"}]
        }))
        .await;

        let generation = engine(base)
            .generate(&[ChatMessage::user("Hallo")], &GenerationParams::default())
            .await
            .unwrap();
        assert_eq!(generation.text, "");
        assert_eq!(generation.tokens_generated, None);
        assert_eq!(generation.finish_reason, FinishReason::MaxTokens);
    }

    #[tokio::test]
    async fn test_unloaded_engine_refuses_to_generate() {
        let engine = OpenAiEngine::new(OpenAiConfig::default()).unwrap();
        let err = engine
            .generate(&[ChatMessage::user("Hallo")], &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ModelNotLoaded));
    }
}
