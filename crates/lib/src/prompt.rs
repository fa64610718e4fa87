//! Fixed reply texts and prompt templates for the consulting bot.

use crate::config::{GenerationConfig, PromptStyle};
use crate::llm::{ChatMessage, CompletionRequest};

/// Header sent before a generated answer.
pub const ANALYSIS_HEADER: &str = "🔎 お困り事を分析しました。提案をお送りします。";

/// Sent instead of an answer when the generation call fails.
pub const GENERATION_ERROR_TEXT: &str =
    "AI提案の生成でエラー。キーワード（請求書/予約/レポート等）で再入力してください。";

const SYSTEM_GUIDE: &str = "あなたは中小企業向けの業務効率化アシスタントです。
相談内容に対して、すぐ試せる現実的な解決策を日本語で簡潔に提案してください。

出力:
- 課題要約（1行）
- 解決案（最大3つ・箇条書き）
  - ツール
  - 手順（3〜5ステップ）
  - 概算コスト/工数";

const EMBEDDED_SYSTEM: &str = "冗長にせず具体的に答える。";

const EMBEDDED_TEMPLATE: &str = "中小企業向けの業務効率化コンサルとして、日本語で簡潔に提案。
- 課題要約（1行）
- 解決案（3つまで、箇条書き）
- ツール/手順（簡潔）";

impl PromptStyle {
    /// First segment of the echo reply when no generation key is configured.
    pub fn echo_header(self) -> &'static str {
        match self {
            PromptStyle::Embedded => "✅ Bot稼働中（OpenAI未設定）。あなたの入力：",
            PromptStyle::SystemGuide => "✅ Bot稼働中（OpenAI未設定）。入力：",
        }
    }

    /// Answer used when the API succeeds but returns no usable content.
    pub fn empty_answer(self) -> &'static str {
        match self {
            PromptStyle::Embedded => "提案の生成に失敗しました。もう一度お試しください。",
            PromptStyle::SystemGuide => "提案の生成に失敗しました。",
        }
    }

    /// Chat messages for one user consultation.
    pub fn messages(self, user_text: &str) -> Vec<ChatMessage> {
        match self {
            PromptStyle::Embedded => vec![
                ChatMessage::system(EMBEDDED_SYSTEM),
                ChatMessage::user(format!("{}\n相談文: 「{}」", EMBEDDED_TEMPLATE, user_text)),
            ],
            PromptStyle::SystemGuide => vec![
                ChatMessage::system(SYSTEM_GUIDE),
                ChatMessage::user(user_text),
            ],
        }
    }
}

/// Build the completion request with the configured fixed parameters.
pub fn completion_request(config: &GenerationConfig, user_text: &str) -> CompletionRequest {
    CompletionRequest {
        model: config.model.clone(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        messages: config.prompt_style.messages(user_text),
    }
}
