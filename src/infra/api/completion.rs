use super::upstream_error;
use crate::types::config::CompletionConfig;
use crate::types::{NewsError, NewsResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

const SERVICE_NAME: &str = "text-completion";

/// テキスト生成APIへの要求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

/// テキスト生成APIの抽象化トレイト
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// 要求に対する生成テキストを返す
    async fn complete(&self, request: &CompletionRequest) -> NewsResult<String>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatCompletionMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatCompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionContent,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionContent {
    content: Option<String>,
}

/// OpenAI互換のChat Completions APIクライアント
pub struct OpenAiCompletionClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompletionClient {
    /// 新しいクライアントを作成
    pub fn new(config: &CompletionConfig, timeout: Duration) -> NewsResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| upstream_error(SERVICE_NAME, e))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> NewsResult<String> {
        let body = ChatCompletionBody {
            model: &self.model,
            messages: vec![
                ChatCompletionMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatCompletionMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| upstream_error(SERVICE_NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(NewsError::upstream(
                SERVICE_NAME,
                format!("status {}: {}", status.as_u16(), error_text),
            ));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| upstream_error(SERVICE_NAME, e))?;

        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| NewsError::upstream(SERVICE_NAME, "生成結果が空です"))
    }
}

/// テスト用のモックテキスト生成クライアント
///
/// 受け取った要求を記録し、定義済みの応答またはエラーを返します。
pub struct MockCompletionClient {
    pub response: String,
    pub should_succeed: bool,
    pub error_message: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionClient {
    /// 成功応答を返すモッククライアントを作成
    pub fn new_success(response: &str) -> Self {
        Self {
            response: response.to_string(),
            should_succeed: true,
            error_message: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// エラーを返すモッククライアントを作成
    pub fn new_error(error_message: &str) -> Self {
        Self {
            response: String::new(),
            should_succeed: false,
            error_message: Some(error_message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// これまでに受け取った要求
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> NewsResult<String> {
        if let Ok(mut guard) = self.requests.lock() {
            guard.push(request.clone());
        }

        if self.should_succeed {
            Ok(self.response.clone())
        } else {
            let message = self
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock completion error".to_string());
            Err(NewsError::upstream(SERVICE_NAME, message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "要約してください".to_string(),
            user: "記事本文".to_string(),
            max_tokens: 256,
        }
    }

    fn client_for(server: &MockServer) -> OpenAiCompletionClient {
        let config = CompletionConfig {
            api_key: "test-key".to_string(),
            base_url: server.url("/v1"),
            model: "test-model".to_string(),
        };
        OpenAiCompletionClient::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_openai_client_success() {
        let server = MockServer::start_async().await;
        let mock = server.mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer test-key")
                .json_body_partial(json!({"model": "test-model"}).to_string());
            then.status(200).json_body(json!({
                "choices": [{"message": {"role": "assistant", "content": "  生成された要約  "}}]
            }));
        })
        .await;

        let text = client_for(&server).complete(&request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(text, "生成された要約");
    }

    #[tokio::test]
    async fn test_openai_client_non_200() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(429).body("rate limited");
        })
        .await;

        let result = client_for(&server).complete(&request()).await;
        match result {
            Err(NewsError::UpstreamService { message, .. }) => {
                assert!(message.contains("429"));
                assert!(message.contains("rate limited"));
            }
            other => panic!("外部サービスエラーになるべき: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_openai_client_empty_choices() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(json!({"choices": []}));
        })
        .await;

        let result = client_for(&server).complete(&request()).await;
        assert!(matches!(result, Err(NewsError::UpstreamService { .. })));
    }

    #[tokio::test]
    async fn test_mock_completion_client_records_requests() {
        let mock_client = MockCompletionClient::new_success("応答");
        let text = mock_client.complete(&request()).await.unwrap();

        assert_eq!(text, "応答");
        assert_eq!(mock_client.requests(), vec![request()]);
    }
}
