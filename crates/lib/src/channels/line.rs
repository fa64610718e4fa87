//! LINE channel: webhook payload types and the reply API client.

use crate::channels::handle::ReplyChannel;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const LINE_API_BASE: &str = "https://api.line.me";

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("line request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("line api error: {0}")]
    Api(String),
    #[error("reply token is empty")]
    MissingReplyToken,
}

/// Webhook POST body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// One webhook event. Only the fields the relay reads are typed; the rest are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub message: Option<EventMessage>,
    #[serde(default)]
    pub reply_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl WebhookEvent {
    /// Text of a text-message event, or None for any other event.
    pub fn text_message(&self) -> Option<&str> {
        if self.typ != "message" {
            return None;
        }
        let msg = self.message.as_ref()?;
        if msg.typ != "text" {
            return None;
        }
        Some(msg.text.as_deref().unwrap_or(""))
    }
}

/// Outbound text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyMessage {
    #[serde(rename = "type")]
    pub typ: String,
    pub text: String,
}

impl ReplyMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            typ: "text".to_string(),
            text: text.into(),
        }
    }
}

/// Body of POST /v2/bot/message/reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    pub reply_token: String,
    pub messages: Vec<ReplyMessage>,
}

/// LINE Messaging API client for replies.
pub struct LineChannel {
    id: String,
    access_token: String,
    api_base: String,
    client: reqwest::Client,
}

impl LineChannel {
    pub fn new(access_token: String, api_base: Option<String>) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| LINE_API_BASE.to_string());
        Self {
            id: "line".to_string(),
            access_token,
            api_base,
            client: reqwest::Client::new(),
        }
    }

    /// POST /v2/bot/message/reply. An empty body from the API is returned as `{}`.
    pub async fn reply_message(
        &self,
        reply_token: &str,
        messages: Vec<ReplyMessage>,
    ) -> Result<serde_json::Value, ChannelError> {
        if reply_token.is_empty() {
            return Err(ChannelError::MissingReplyToken);
        }
        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let body = ReplyRequest {
            reply_token: reply_token.to_string(),
            messages,
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChannelError::Api(format!("{} {}", status, body)));
        }
        let text = res.text().await?;
        if text.trim().is_empty() {
            return Ok(serde_json::json!({}));
        }
        serde_json::from_str(&text)
            .map_err(|e| ChannelError::Api(format!("invalid reply response: {}", e)))
    }
}

#[async_trait]
impl ReplyChannel for LineChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn reply(
        &self,
        reply_token: &str,
        messages: Vec<ReplyMessage>,
    ) -> Result<serde_json::Value, ChannelError> {
        self.reply_message(reply_token, messages).await
    }
}
