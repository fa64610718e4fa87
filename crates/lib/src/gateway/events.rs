//! Per-event processing: decide the reply for one webhook event and send it.
//!
//! Events of one webhook call run as separate tasks and are awaited together. Any failure,
//! including a panicking task, fails the whole batch so the caller can answer `handled`.

use crate::channels::{ChannelError, ReplyChannel, ReplyMessage, WebhookEvent};
use crate::config::GenerationConfig;
use crate::llm::TextGenerator;
use crate::prompt::{self, ANALYSIS_HEADER, GENERATION_ERROR_TEXT};
use futures_util::future::join_all;
use std::sync::Arc;

/// Max characters of user input echoed back in echo mode.
pub const ECHO_LIMIT: usize = 1000;
/// Max characters of a generated answer (LINE text message limit).
/// Both limits count Unicode scalar values, so an emoji outside the BMP counts once, not as two UTF-16 units.
pub const ANSWER_LIMIT: usize = 5000;

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("reply failed: {0}")]
    Reply(#[from] ChannelError),
    #[error("text message event has no reply token")]
    MissingReplyToken,
    #[error("event task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// What event processing needs from the gateway. Cheap to clone into each task.
#[derive(Clone)]
pub struct EventContext {
    pub channel: Arc<dyn ReplyChannel>,
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub generation: Arc<GenerationConfig>,
}

/// Prefix of `s` holding at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// Build the two reply segments for a user's (trimmed) text.
pub async fn compose_reply(
    text: &str,
    generator: Option<&dyn TextGenerator>,
    generation: &GenerationConfig,
) -> Vec<ReplyMessage> {
    let style = generation.prompt_style;
    let Some(generator) = generator else {
        return vec![
            ReplyMessage::text(style.echo_header()),
            ReplyMessage::text(truncate_chars(text, ECHO_LIMIT)),
        ];
    };

    let request = prompt::completion_request(generation, text);
    let answer = match generator.complete(request).await {
        Ok(content) => content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| style.empty_answer().to_string()),
        Err(e) => {
            log::error!("generation failed: {}", e);
            GENERATION_ERROR_TEXT.to_string()
        }
    };
    vec![
        ReplyMessage::text(ANALYSIS_HEADER),
        ReplyMessage::text(truncate_chars(&answer, ANSWER_LIMIT)),
    ]
}

/// Handle one event. Non-text events produce no reply and `Ok(None)`.
pub async fn handle_event(
    event: &WebhookEvent,
    ctx: &EventContext,
) -> Result<Option<serde_json::Value>, EventError> {
    let Some(text) = event.text_message() else {
        log::debug!("skipping {} event", event.typ);
        return Ok(None);
    };
    let reply_token = event
        .reply_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or(EventError::MissingReplyToken)?;
    let messages = compose_reply(text.trim(), ctx.generator.as_deref(), &ctx.generation).await;
    let res = ctx.channel.reply(reply_token, messages).await?;
    Ok(Some(res))
}

/// Handle all events concurrently; results keep the input order.
pub async fn handle_events(
    events: Vec<WebhookEvent>,
    ctx: &EventContext,
) -> Result<Vec<Option<serde_json::Value>>, EventError> {
    let tasks = events.into_iter().map(|event| {
        let ctx = ctx.clone();
        tokio::spawn(async move { handle_event(&event, &ctx).await })
    });
    join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap_or_else(|e| Err(EventError::Task(e))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromptStyle;
    use crate::llm::{CompletionRequest, LlmError};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingChannel {
        replies: Mutex<Vec<(String, Vec<ReplyMessage>)>>,
        fail: bool,
    }

    #[async_trait]
    impl ReplyChannel for RecordingChannel {
        fn id(&self) -> &str {
            "test"
        }

        async fn reply(
            &self,
            reply_token: &str,
            messages: Vec<ReplyMessage>,
        ) -> Result<serde_json::Value, ChannelError> {
            if self.fail {
                return Err(ChannelError::Api("400 Bad Request".into()));
            }
            self.replies
                .lock()
                .await
                .push((reply_token.to_string(), messages));
            Ok(serde_json::json!({}))
        }
    }

    enum Canned {
        Answer(String),
        Empty,
        Fail,
        Panic,
    }

    struct CannedGenerator {
        canned: Canned,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl CannedGenerator {
        fn new(canned: Canned) -> Self {
            Self {
                canned,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn complete(&self, request: CompletionRequest) -> Result<Option<String>, LlmError> {
            self.seen.lock().await.push(request);
            match &self.canned {
                Canned::Answer(a) => Ok(Some(a.clone())),
                Canned::Empty => Ok(Some("   ".to_string())),
                Canned::Fail => Err(LlmError::Api("500 Internal Server Error".into())),
                Canned::Panic => panic!("generator blew up"),
            }
        }
    }

    fn text_event(token: &str, text: &str) -> WebhookEvent {
        serde_json::from_value(serde_json::json!({
            "type": "message",
            "replyToken": token,
            "message": { "type": "text", "text": text }
        }))
        .unwrap()
    }

    fn context(
        channel: Arc<RecordingChannel>,
        generator: Option<Arc<CannedGenerator>>,
    ) -> EventContext {
        EventContext {
            channel,
            generator: generator.map(|g| g as Arc<dyn TextGenerator>),
            generation: Arc::new(GenerationConfig::default()),
        }
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("請求書作成", 2), "請求");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn truncate_counts_astral_characters_once() {
        assert_eq!(truncate_chars("😀😀😀", 2), "😀😀");
        assert_eq!(truncate_chars(&"😀".repeat(ANSWER_LIMIT), ANSWER_LIMIT).chars().count(), ANSWER_LIMIT);
    }

    #[tokio::test]
    async fn echo_mode_replies_with_header_and_trimmed_text() {
        let channel = Arc::new(RecordingChannel::default());
        let ctx = context(channel.clone(), None);
        let out = handle_event(&text_event("r1", "  hello \n"), &ctx).await.unwrap();
        assert_eq!(out, Some(serde_json::json!({})));
        let replies = channel.replies.lock().await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "r1");
        assert_eq!(
            replies[0].1,
            vec![
                ReplyMessage::text(PromptStyle::Embedded.echo_header()),
                ReplyMessage::text("hello"),
            ]
        );
    }

    #[tokio::test]
    async fn echo_is_truncated_to_limit() {
        let channel = Arc::new(RecordingChannel::default());
        let ctx = context(channel.clone(), None);
        let long = "あ".repeat(ECHO_LIMIT + 50);
        handle_event(&text_event("r", &long), &ctx).await.unwrap();
        let replies = channel.replies.lock().await;
        assert_eq!(replies[0].1[1].text.chars().count(), ECHO_LIMIT);
    }

    #[tokio::test]
    async fn non_text_event_produces_no_reply() {
        let channel = Arc::new(RecordingChannel::default());
        let ctx = context(channel.clone(), None);
        let sticker: WebhookEvent = serde_json::from_value(serde_json::json!({
            "type": "message",
            "replyToken": "r",
            "message": { "type": "sticker" }
        }))
        .unwrap();
        let follow: WebhookEvent =
            serde_json::from_value(serde_json::json!({ "type": "follow", "replyToken": "r" }))
                .unwrap();
        assert_eq!(handle_event(&sticker, &ctx).await.unwrap(), None);
        assert_eq!(handle_event(&follow, &ctx).await.unwrap(), None);
        assert!(channel.replies.lock().await.is_empty());
    }

    #[tokio::test]
    async fn generated_answer_is_trimmed_after_header() {
        let channel = Arc::new(RecordingChannel::default());
        let generator = Arc::new(CannedGenerator::new(Canned::Answer("  提案です  ".into())));
        let ctx = context(channel.clone(), Some(generator.clone()));
        handle_event(&text_event("r", " 請求書 "), &ctx).await.unwrap();
        let replies = channel.replies.lock().await;
        assert_eq!(
            replies[0].1,
            vec![ReplyMessage::text(ANALYSIS_HEADER), ReplyMessage::text("提案です")]
        );
        let seen = generator.seen.lock().await;
        assert!(seen[0].messages[1].content.contains("「請求書」"));
    }

    #[tokio::test]
    async fn generated_answer_is_truncated_to_limit() {
        let long = "x".repeat(ANSWER_LIMIT + 10);
        let channel = Arc::new(RecordingChannel::default());
        let generator = Arc::new(CannedGenerator::new(Canned::Answer(long)));
        let ctx = context(channel.clone(), Some(generator));
        handle_event(&text_event("r", "q"), &ctx).await.unwrap();
        let replies = channel.replies.lock().await;
        assert_eq!(replies[0].1[1].text.len(), ANSWER_LIMIT);
    }

    #[tokio::test]
    async fn generation_failure_replies_with_error_text() {
        let channel = Arc::new(RecordingChannel::default());
        let generator = Arc::new(CannedGenerator::new(Canned::Fail));
        let ctx = context(channel.clone(), Some(generator));
        handle_event(&text_event("r", "q"), &ctx).await.unwrap();
        let replies = channel.replies.lock().await;
        assert_eq!(replies[0].1[1].text, GENERATION_ERROR_TEXT);
    }

    #[tokio::test]
    async fn blank_completion_uses_style_fallback() {
        let channel = Arc::new(RecordingChannel::default());
        let generator = Arc::new(CannedGenerator::new(Canned::Empty));
        let ctx = context(channel.clone(), Some(generator));
        handle_event(&text_event("r", "q"), &ctx).await.unwrap();
        let replies = channel.replies.lock().await;
        assert_eq!(replies[0].1[1].text, PromptStyle::Embedded.empty_answer());
    }

    #[tokio::test]
    async fn text_event_without_token_is_an_error() {
        let channel = Arc::new(RecordingChannel::default());
        let ctx = context(channel.clone(), None);
        let ev: WebhookEvent = serde_json::from_value(serde_json::json!({
            "type": "message",
            "message": { "type": "text", "text": "hi" }
        }))
        .unwrap();
        let err = handle_event(&ev, &ctx).await.unwrap_err();
        assert!(matches!(err, EventError::MissingReplyToken));
    }

    #[tokio::test]
    async fn batch_keeps_order_and_nulls() {
        let channel = Arc::new(RecordingChannel::default());
        let ctx = context(channel.clone(), None);
        let follow: WebhookEvent =
            serde_json::from_value(serde_json::json!({ "type": "follow" })).unwrap();
        let out = handle_events(
            vec![text_event("a", "1"), follow, text_event("b", "2")],
            &ctx,
        )
        .await
        .unwrap();
        assert_eq!(
            out,
            vec![Some(serde_json::json!({})), None, Some(serde_json::json!({}))]
        );
        let mut tokens: Vec<String> = channel
            .replies
            .lock()
            .await
            .iter()
            .map(|(t, _)| t.clone())
            .collect();
        tokens.sort();
        assert_eq!(tokens, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn batch_fails_when_any_reply_fails() {
        let channel = Arc::new(RecordingChannel {
            fail: true,
            ..Default::default()
        });
        let ctx = context(channel, None);
        let err = handle_events(vec![text_event("a", "1")], &ctx).await.unwrap_err();
        assert!(matches!(err, EventError::Reply(_)));
    }

    #[tokio::test]
    async fn batch_fails_when_a_task_panics() {
        let channel = Arc::new(RecordingChannel::default());
        let generator = Arc::new(CannedGenerator::new(Canned::Panic));
        let ctx = context(channel, Some(generator));
        let err = handle_events(vec![text_event("a", "1")], &ctx).await.unwrap_err();
        assert!(matches!(err, EventError::Task(_)));
    }
}
