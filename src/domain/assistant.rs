use crate::infra::api::completion::{CompletionClient, CompletionRequest};
use crate::types::{NewsError, NewsResult};
use serde::{Deserialize, Serialize};

// 長すぎる本文は切り詰めて送る
const MAX_CONTENT_CHARS: usize = 10_000;

/// 要約のスタイル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryStyle {
    /// 1〜2文
    #[default]
    Concise,
    /// 3〜4文
    Detailed,
    /// 要点3つ
    KeyPoints,
}

impl SummaryStyle {
    fn instruction(&self) -> &'static str {
        match self {
            Self::Concise => "Summarize the article in 1-2 sentences.",
            Self::Detailed => "Summarize the article in 3-4 sentences.",
            Self::KeyPoints => "Summarize the article as exactly 3 bullet points.",
        }
    }

    fn max_tokens(&self) -> u32 {
        match self {
            Self::Concise => 200,
            Self::Detailed => 400,
            Self::KeyPoints => 400,
        }
    }
}

fn require_text<'a>(value: &'a str, name: &str) -> NewsResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(NewsError::invalid_input(format!("{}が空です", name)));
    }
    Ok(trimmed)
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// 記事本文を指定スタイルで要約する
pub async fn summarize(
    client: &dyn CompletionClient,
    content: &str,
    style: SummaryStyle,
) -> NewsResult<String> {
    let content = require_text(content, "content")?;

    let request = CompletionRequest {
        system: format!(
            "You summarize news articles neutrally, in the language of the article. {}",
            style.instruction()
        ),
        user: truncate_chars(content, MAX_CONTENT_CHARS).to_string(),
        max_tokens: style.max_tokens(),
    };

    client.complete(&request).await
}

/// 記事本文に関する質問に答える
pub async fn answer_question(
    client: &dyn CompletionClient,
    content: &str,
    question: &str,
) -> NewsResult<String> {
    let content = require_text(content, "content")?;
    let question = require_text(question, "question")?;

    let request = CompletionRequest {
        system: "You answer questions about the given news article. \
                 Base the answer only on the article and say so when it does not contain the answer."
            .to_string(),
        user: format!(
            "Article:\n{}\n\nQuestion:\n{}",
            truncate_chars(content, MAX_CONTENT_CHARS),
            question
        ),
        max_tokens: 600,
    };

    client.complete(&request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::api::completion::MockCompletionClient;

    #[test]
    fn test_summary_style_serde() {
        let style: SummaryStyle = serde_json::from_str(r#""key-points""#).unwrap();
        assert_eq!(style, SummaryStyle::KeyPoints);
        assert_eq!(SummaryStyle::default(), SummaryStyle::Concise);
        assert!(serde_json::from_str::<SummaryStyle>(r#""poem""#).is_err());
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("가나다라", 2), "가나");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_summarize_passes_style() {
        let client = MockCompletionClient::new_success("요약 결과");
        let summary = summarize(&client, "기사 본문", SummaryStyle::KeyPoints)
            .await
            .unwrap();

        assert_eq!(summary, "요약 결과");
        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].system.contains("3 bullet points"));
        assert_eq!(requests[0].user, "기사 본문");
    }

    #[tokio::test]
    async fn test_summarize_empty_content() {
        let client = MockCompletionClient::new_success("unused");
        let result = summarize(&client, "   ", SummaryStyle::Concise).await;

        assert!(matches!(result, Err(NewsError::InvalidInput { .. })));
        assert!(client.requests().is_empty(), "外部サービスは呼ばれない");
    }

    #[tokio::test]
    async fn test_answer_question() {
        let client = MockCompletionClient::new_success("답변");
        let answer = answer_question(&client, "본문", "누가?").await.unwrap();

        assert_eq!(answer, "답변");
        let requests = client.requests();
        assert!(requests[0].user.contains("본문"));
        assert!(requests[0].user.contains("누가?"));
    }

    #[tokio::test]
    async fn test_answer_question_empty_question() {
        let client = MockCompletionClient::new_success("unused");
        let result = answer_question(&client, "본문", "").await;
        assert!(matches!(result, Err(NewsError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_upstream_error_is_surfaced() {
        let client = MockCompletionClient::new_error("503 Service Unavailable");
        let result = summarize(&client, "본문", SummaryStyle::Detailed).await;
        assert!(matches!(result, Err(NewsError::UpstreamService { .. })));
    }
}
