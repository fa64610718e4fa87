//! Generation API: OpenAI-compatible chat completions.
//!
//! Event handling depends on [`TextGenerator`] rather than the concrete client.

mod openai;

pub use openai::{ChatMessage, CompletionRequest, LlmError, OpenAiClient, OPENAI_API_BASE};

use async_trait::async_trait;

/// Anything that can turn a chat request into a single completion text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the first choice's content, or None when the API returned no content.
    async fn complete(&self, request: CompletionRequest) -> Result<Option<String>, LlmError>;
}
