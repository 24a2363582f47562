use crate::infra::api::completion::{CompletionClient, OpenAiCompletionClient};
use crate::infra::api::news::{NewsApiClient, NewsClient};
use crate::infra::db::setup_database;
use crate::types::AppConfig;
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;

/// ハンドラに注入するクライアント群
///
/// 起動時に一度だけ構築し、リクエストごとにcloneして渡す。
/// プールとクライアントは内部で共有されるため、cloneは安価。
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub news_client: Arc<dyn NewsClient>,
    pub completion_client: Arc<dyn CompletionClient>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        news_client: Arc<dyn NewsClient>,
        completion_client: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            pool,
            news_client,
            completion_client,
        }
    }

    /// 設定から本番用のクライアントを構築する
    /// データベースのマイグレーションもここで実行する
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let pool = setup_database(&config.database).await?;
        let news_client = NewsApiClient::new(&config.news_api, config.http_timeout)
            .context("ニュースAPIクライアントの初期化に失敗")?;
        let completion_client =
            OpenAiCompletionClient::new(&config.completion, config.http_timeout)
                .context("テキスト生成クライアントの初期化に失敗")?;

        Ok(Self::new(
            pool,
            Arc::new(news_client),
            Arc::new(completion_client),
        ))
    }
}
