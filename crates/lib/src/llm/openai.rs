//! OpenAI chat completions client (https://api.openai.com/v1 by default).
//! Non-streaming only; the relay sends one request per event.

use crate::llm::TextGenerator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("generation api error: {0}")]
    Api(String),
}

/// One chat message (role + content).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Body of POST /chat/completions.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
    }
}

/// Client for the chat completions endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| OPENAI_API_BASE.to_string());
        Self {
            base_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// POST /chat/completions, non-streaming.
    pub async fn chat(&self, request: &CompletionRequest) -> Result<Option<String>, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{} {}", status, body)));
        }
        let data: CompletionResponse = res.json().await?;
        Ok(data.into_content())
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Option<String>, LlmError> {
        self.chat(&request).await
    }
}
