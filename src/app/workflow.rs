use crate::{
    domain::article::{ingest_articles, IngestReport},
    infra::api::news::NewsClient,
    types::NewsResult,
};
use sqlx::PgPool;
use tracing::{error, info};

/// カテゴリごとの取り込み結果
#[derive(Debug)]
pub struct CategoryOutcome {
    pub category: String,
    pub result: NewsResult<IngestReport>,
}

impl CategoryOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// ニュースAPIから1カテゴリ分の記事を取得して取り込む
pub async fn fetch_and_ingest(
    client: &dyn NewsClient,
    category: &str,
    pool: &PgPool,
) -> NewsResult<IngestReport> {
    let sources = client.fetch_top_headlines(category).await?;
    info!(category, fetched = sources.len(), "ニュースAPIから記事を取得しました");

    ingest_articles(&sources, pool).await
}

/// 取り込みワークフローのメイン実行関数（依存性を注入）
///
/// 1. 各カテゴリのトップニュースをニュースAPIから取得
/// 2. 検証して正しい記事をDBに保存
///
/// あるカテゴリが失敗しても残りのカテゴリは処理を続ける。
pub async fn execute_ingest_workflow(
    client: &dyn NewsClient,
    pool: &PgPool,
    categories: &[String],
) -> Vec<CategoryOutcome> {
    info!(categories = categories.len(), "=== 記事取り込みワークフロー開始 ===");

    let mut outcomes = Vec::with_capacity(categories.len());
    for category in categories {
        let result = fetch_and_ingest(client, category, pool).await;
        match &result {
            Ok(report) => info!(category = %category, "{}", report),
            Err(e) => error!(category = %category, error = %e, "カテゴリの取り込みに失敗しました"),
        }
        outcomes.push(CategoryOutcome {
            category: category.clone(),
            result,
        });
    }

    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    info!(
        succeeded,
        failed = outcomes.len() - succeeded,
        "=== 記事取り込みワークフロー完了 ==="
    );

    outcomes
}
