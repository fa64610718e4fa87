//! Reply channel trait: the one outbound operation event handling needs.

use crate::channels::line::{ChannelError, ReplyMessage};
use async_trait::async_trait;

/// Handle to a channel that can answer an event with its reply token.
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    /// Channel id (e.g. "line").
    fn id(&self) -> &str;
    /// Send messages using a one-time reply token. Returns the platform's response JSON.
    async fn reply(
        &self,
        reply_token: &str,
        messages: Vec<ReplyMessage>,
    ) -> Result<serde_json::Value, ChannelError>;
}
