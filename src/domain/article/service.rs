use super::model::{BiasLabel, IngestFailure, IngestReport, NewArticle, SourceArticle};
use super::repository::insert_articles;
use crate::infra::parser::parse_optional_date;
use crate::types::NewsResult;
use sqlx::PgPool;
use tracing::{info, warn};

/// カテゴリが無い記事に使う既定値
pub const DEFAULT_CATEGORY: &str = "general";

// 空白のみの値は欠損として扱う
fn required_field(value: Option<&String>, name: &str) -> Result<String, String> {
    match value.map(|v| v.trim()) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(format!("{}が空です", name)),
    }
}

impl NewArticle {
    /// 外部記事を検証して保存用の記事に変換する
    ///
    /// - title・source・sourceUrlは必須
    /// - publishedAtが無い・空なら日付なし、解析できなければエラー
    /// - bias_labelは常にcenter
    pub fn from_source(source: &SourceArticle) -> Result<Self, String> {
        let title = required_field(source.title.as_ref(), "title")?;
        let source_name = required_field(source.source.as_ref(), "source")?;
        let source_url = required_field(source.source_url.as_ref(), "sourceUrl")?;
        let published_at = parse_optional_date(source.published_at.as_deref())
            .map_err(|e| format!("publishedAtが不正です: {}", e))?;
        let category = source
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string();

        Ok(Self {
            title,
            content: source.content.clone().unwrap_or_default(),
            source: source_name,
            source_url,
            category,
            published_at,
            bias_label: BiasLabel::Center,
        })
    }
}

/// 外部記事の配列を検証し、保存可能な記事と除外行に分ける
///
/// 入力の順序を保つため、同じ入力からは常に同じ結果になる。
pub fn prepare_articles(sources: &[SourceArticle]) -> (Vec<NewArticle>, Vec<IngestFailure>) {
    let mut valid = Vec::with_capacity(sources.len());
    let mut failed = Vec::new();

    for (index, source) in sources.iter().enumerate() {
        match NewArticle::from_source(source) {
            Ok(article) => valid.push(article),
            Err(reason) => failed.push(IngestFailure {
                index,
                source_url: source.source_url.clone(),
                reason,
            }),
        }
    }

    (valid, failed)
}

/// # 概要
/// 外部記事を取り込み、データベースに保存する。
///
/// ## 動作
/// - 各記事を検証し、不正な行は除外して`failed`に記録する
/// - 正しい行は1つのトランザクションでまとめて保存する
/// - 同じsource_urlの記事を重複排除しない（呼び出し側の責務）
///
/// ## エラー
/// 保存に失敗した場合は1件も保存せずにエラーを返す。
pub async fn ingest_articles(sources: &[SourceArticle], pool: &PgPool) -> NewsResult<IngestReport> {
    let (valid, failed) = prepare_articles(sources);

    for failure in &failed {
        warn!(
            index = failure.index,
            source_url = failure.source_url.as_deref().unwrap_or(""),
            reason = %failure.reason,
            "記事を取り込みから除外しました"
        );
    }

    let inserted = insert_articles(&valid, pool).await?;
    let report = IngestReport { inserted, failed };
    info!("{}", report);

    Ok(report)
}
