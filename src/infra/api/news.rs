use super::upstream_error;
use crate::domain::article::SourceArticle;
use crate::types::config::NewsApiConfig;
use crate::types::{NewsError, NewsResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const SERVICE_NAME: &str = "news-api";

/// ニュース取得APIの抽象化トレイト
///
/// 実際のNewsAPI通信とモック実装の両方を統一的に扱えるようにするためのインターフェースです。
#[async_trait]
pub trait NewsClient: Send + Sync {
    /// 指定カテゴリのトップニュースを取得する
    ///
    /// # Arguments
    /// * `category` - 取得対象のカテゴリ（general, politics など）
    async fn fetch_top_headlines(&self, category: &str) -> NewsResult<Vec<SourceArticle>>;
}

// NewsAPIのレスポンス形式
#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct NewsApiArticle {
    source: NewsApiSource,
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NewsApiSource {
    name: Option<String>,
}

impl NewsApiArticle {
    // contentが無い記事はdescriptionで代用する
    fn into_source_article(self, category: &str) -> SourceArticle {
        SourceArticle {
            title: self.title,
            content: self.content.or(self.description),
            source: self.source.name,
            source_url: self.url,
            published_at: self.published_at,
            category: Some(category.to_string()),
        }
    }
}

/// `reqwest` を使用したNewsAPIクライアント
pub struct NewsApiClient {
    client: Client,
    base_url: String,
    api_key: String,
    country: String,
}

impl NewsApiClient {
    /// 新しいクライアントを作成
    pub fn new(config: &NewsApiConfig, timeout: Duration) -> NewsResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| upstream_error(SERVICE_NAME, e))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            country: config.country.clone(),
        })
    }
}

#[async_trait]
impl NewsClient for NewsApiClient {
    async fn fetch_top_headlines(&self, category: &str) -> NewsResult<Vec<SourceArticle>> {
        let url = format!("{}/top-headlines", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("country", self.country.as_str()),
                ("category", category),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| upstream_error(SERVICE_NAME, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| upstream_error(SERVICE_NAME, e))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<NewsApiResponse>(&body)
                .ok()
                .and_then(|r| r.message)
                .unwrap_or(body);
            return Err(NewsError::upstream(
                SERVICE_NAME,
                format!("status {}: {}", status.as_u16(), detail),
            ));
        }

        let parsed: NewsApiResponse = serde_json::from_str(&body).map_err(|e| {
            NewsError::upstream(SERVICE_NAME, format!("レスポンスの解析に失敗: {}", e))
        })?;

        if parsed.status != "ok" {
            return Err(NewsError::upstream(
                SERVICE_NAME,
                parsed
                    .message
                    .unwrap_or_else(|| format!("status={}", parsed.status)),
            ));
        }

        Ok(parsed
            .articles
            .into_iter()
            .map(|article| article.into_source_article(category))
            .collect())
    }
}

/// テスト用のモックニュースクライアント
///
/// 実際のHTTPリクエストを行わずに、定義済みの記事やエラーを返します。
pub struct MockNewsClient {
    /// モック時に返す記事
    pub articles: Vec<SourceArticle>,
    /// 成功/失敗の制御
    pub should_succeed: bool,
    /// エラー時に返すメッセージ
    pub error_message: Option<String>,
}

impl MockNewsClient {
    /// 記事を返すモッククライアントを作成
    pub fn new_success(articles: Vec<SourceArticle>) -> Self {
        Self {
            articles,
            should_succeed: true,
            error_message: None,
        }
    }

    /// エラーを返すモッククライアントを作成
    pub fn new_error(error_message: &str) -> Self {
        Self {
            articles: Vec::new(),
            should_succeed: false,
            error_message: Some(error_message.to_string()),
        }
    }
}

#[async_trait]
impl NewsClient for MockNewsClient {
    async fn fetch_top_headlines(&self, category: &str) -> NewsResult<Vec<SourceArticle>> {
        if !self.should_succeed {
            let message = self
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock news error".to_string());
            return Err(NewsError::upstream(SERVICE_NAME, message));
        }

        Ok(self
            .articles
            .iter()
            .cloned()
            .map(|mut article| {
                if article.category.is_none() {
                    article.category = Some(category.to_string());
                }
                article
            })
            .collect())
    }
}
