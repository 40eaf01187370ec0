//! Chat-completion client for Pulso
//!
//! Provides a `CompletionBackend` trait with one implementation:
//! - **OpenAI-compatible**: `POST {base_url}/chat/completions` with bearer auth
//!
//! Handlers hold an `Arc<dyn CompletionBackend>` so tests can point the client
//! at a mock server.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::CompletionSettings;

// ============================================================================
// CompletionBackend trait
// ============================================================================

/// Abstraction over hosted completion providers.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run one completion and return the assistant text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;

    /// Model id sent upstream.
    fn model(&self) -> &str;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }
}

/// One completion call: the ordered messages and whether the reply must be a
/// JSON object.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<PromptMessage>,
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<PromptMessage>) -> Self {
        Self {
            messages,
            json_mode: false,
        }
    }

    pub fn json(messages: Vec<PromptMessage>) -> Self {
        Self {
            messages,
            json_mode: true,
        }
    }
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Completion response had no content")]
    EmptyResponse,

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} completion attempts failed")]
    RetryExhausted { attempts: usize },
}

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl CompletionConfig {
    pub fn from_settings(settings: &CompletionSettings) -> Self {
        Self {
            api_key: settings.api_key(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout_seconds: settings.timeout_seconds,
            max_retries: settings.max_retries,
            retry_delay_ms: settings.retry_delay_ms,
        }
    }
}

// ============================================================================
// OpenAI-compatible wire structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// OpenAiCompatClient
// ============================================================================

/// Client for any endpoint that speaks the OpenAI chat-completions protocol.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: Client,
    config: CompletionConfig,
    base_url: String,
}

impl OpenAiCompatClient {
    pub fn new(config: CompletionConfig, base_url: String) -> Result<Self, CompletionError> {
        if config.api_key.is_empty() {
            return Err(CompletionError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &CompletionSettings) -> Result<Self, CompletionError> {
        Self::new(
            CompletionConfig::from_settings(settings),
            settings.base_url.clone(),
        )
    }

    async fn complete_once(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatCompletionBody {
            model: &self.config.model,
            messages: &request.messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: request.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);

            tracing::error!(code = status.as_u16(), message = %message, "Completion API error");

            return Err(CompletionError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(CompletionError::EmptyResponse)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        match Retry::start(retry_strategy, || self.complete_once(request)).await {
            Ok(text) => Ok(text),
            Err(e) if self.config.max_retries == 0 => Err(e),
            Err(e) => {
                tracing::error!(
                    attempts = self.config.max_retries + 1,
                    error = %e,
                    "All completion attempts failed"
                );
                Err(CompletionError::RetryExhausted {
                    attempts: self.config.max_retries + 1,
                })
            }
        }
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_key: &str, max_retries: usize) -> CompletionConfig {
        CompletionConfig {
            api_key: api_key.to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.7,
            max_tokens: 256,
            timeout_seconds: 5,
            max_retries,
            retry_delay_ms: 10,
        }
    }

    fn mock_reply(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    #[tokio::test]
    async fn test_complete_posts_messages_and_returns_content() {
        let mock_server = MockServer::start().await;
        let client = OpenAiCompatClient::new(test_config("test-key", 0), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama-3.3-70b-versatile",
                "messages": [
                    { "role": "system", "content": "be brief" },
                    { "role": "user", "content": "hola" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_reply("¡Hola!")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let request = CompletionRequest::new(vec![
            PromptMessage::system("be brief"),
            PromptMessage::user("hola"),
        ]);
        let reply = client.complete(&request).await.unwrap();
        assert_eq!(reply, "¡Hola!");
    }

    #[tokio::test]
    async fn test_json_mode_sets_response_format() {
        let mock_server = MockServer::start().await;
        let client =
            OpenAiCompatClient::new(test_config("test-key", 0), mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "response_format": { "type": "json_object" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_reply("{}")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let request = CompletionRequest::json(vec![PromptMessage::user("apple")]);
        assert_eq!(client.complete(&request).await.unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_api_error_is_terminal_without_retries() {
        let mock_server = MockServer::start().await;
        let client =
            OpenAiCompatClient::new(test_config("test-key", 0), mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "message": "upstream exploded", "type": "server_error" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = client
            .complete(&CompletionRequest::new(vec![PromptMessage::user("hi")]))
            .await;

        match result {
            Err(CompletionError::Api { code, message }) => {
                assert_eq!(code, 500);
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_retries_on_429_when_enabled() {
        let mock_server = MockServer::start().await;
        let client =
            OpenAiCompatClient::new(test_config("test-key", 2), mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "message": "Rate limit exceeded" }
            })))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_reply("ok")))
            .mount(&mock_server)
            .await;

        let reply = client
            .complete(&CompletionRequest::new(vec![PromptMessage::user("hi")]))
            .await;
        assert_eq!(reply.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_retry_exhausted_reports_attempts() {
        let mock_server = MockServer::start().await;
        let client =
            OpenAiCompatClient::new(test_config("test-key", 2), mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&mock_server)
            .await;

        let result = client
            .complete(&CompletionRequest::new(vec![PromptMessage::user("hi")]))
            .await;
        match result {
            Err(CompletionError::RetryExhausted { attempts }) => assert_eq!(attempts, 3),
            other => panic!("Expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_null_content_is_empty_response() {
        let mock_server = MockServer::start().await;
        let client =
            OpenAiCompatClient::new(test_config("test-key", 0), mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": null } }]
            })))
            .mount(&mock_server)
            .await;

        let result = client
            .complete(&CompletionRequest::new(vec![PromptMessage::user("hi")]))
            .await;
        assert!(matches!(result, Err(CompletionError::EmptyResponse)));
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        let result = OpenAiCompatClient::new(test_config("", 0), "http://localhost".to_string());
        assert!(matches!(result, Err(CompletionError::MissingApiKey)));
    }
}
