//! OpenAI-compatible chat completion client

use crate::RequestError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use weakscale_core::Endpoint;

pub use weakscale_core::DEFAULT_MODEL;

/// Key sent to endpoints that do not check authentication
pub const DEFAULT_API_KEY: &str = "EMPTY";

/// Token budget for every completion the harness requests
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Everything the prober and dispatcher need to talk to one endpoint
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub endpoint: Endpoint,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request deadline; `None` waits for the server indefinitely
    pub request_timeout: Option<Duration>,
}

impl HarnessConfig {
    /// Greedy decoding with the default key and token budget
    pub fn new(endpoint: Endpoint, model: impl Into<String>) -> Self {
        Self {
            endpoint,
            api_key: DEFAULT_API_KEY.to_string(),
            model: model.into(),
            temperature: 0.0,
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout: None,
        }
    }

    /// Single-message, non-streaming request for `content`
    pub fn request(&self, content: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(content)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// Body of `POST /v1/chat/completions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

/// The parts of a chat completion the harness reads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Response with a single choice carrying `content`
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            choices: vec![ChatChoice {
                message: ResponseMessage {
                    content: Some(content.into()),
                },
            }],
        }
    }

    /// Text of the first choice, if any
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first()?.message.content.as_deref()
    }
}

/// A chat completion backend
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Issue one completion request and wait for its full response
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, RequestError>;
}

/// HTTP client for OpenAI-compatible serving endpoints
pub struct OpenAiClient {
    /// HTTP client for completion requests
    http: reqwest::Client,
    /// `http://host:port/v1`
    api_base: String,
    api_key: String,
}

impl OpenAiClient {
    /// Create a client for the endpoint in `config`
    pub fn new(config: &HarnessConfig) -> Result<Self, RequestError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            api_base: config.endpoint.api_base(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, RequestError> {
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RequestError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let parsed: ChatResponse = serde_json::from_slice(&body)
            .map_err(|e| RequestError::MalformedResponse(e.to_string()))?;

        debug!(endpoint = %url, choices = parsed.choices.len(), "Completion received");
        Ok(parsed)
    }
}
