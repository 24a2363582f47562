use crate::domain::article::{search_articles, Article, ArticleQuery, BiasLabel};
use crate::domain::vote::find_votes_for_articles;
use crate::types::{NewsError, NewsResult};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

/// limit未指定時の件数
pub const DEFAULT_FEED_LIMIT: i64 = 10;
/// 1回で返す最大件数
pub const MAX_FEED_LIMIT: i64 = 100;

/// 要求ユーザーの投票を付けた記事
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    #[serde(flatten)]
    pub article: Article,
    /// 未投票はnull（falseの投票とは区別する）
    pub user_vote: Option<bool>,
}

// フィード取得の条件
#[derive(Debug, Default, Clone)]
pub struct FeedQuery {
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub bias_label: Option<BiasLabel>,
}

/// 件数を正規化する
/// 未指定は既定値、上限超過は上限に丸める。負数はエラー
pub fn normalize_limit(limit: Option<i64>) -> NewsResult<i64> {
    match limit {
        None => Ok(DEFAULT_FEED_LIMIT),
        Some(n) if n < 0 => Err(NewsError::invalid_input(format!(
            "limitは0以上である必要があります: {}",
            n
        ))),
        Some(n) => Ok(n.min(MAX_FEED_LIMIT)),
    }
}

/// 記事に投票を付ける
pub fn decorate_with_votes(articles: Vec<Article>, votes: &HashMap<Uuid, bool>) -> Vec<FeedItem> {
    articles
        .into_iter()
        .map(|article| {
            let user_vote = votes.get(&article.id).copied();
            FeedItem { article, user_vote }
        })
        .collect()
}

/// # 概要
/// 最新の記事を取得し、要求ユーザーの投票を付けて返す。
///
/// ## 動作
/// - published_atの降順（日付なしは末尾、同時刻は取り込み順）
/// - 投票は1回のクエリでまとめて取得する
/// - 外部IDが無い・未登録のユーザーの場合は全てnull（ユーザーは作成しない）
pub async fn get_feed(
    query: &FeedQuery,
    requesting_external_id: Option<&str>,
    pool: &PgPool,
) -> NewsResult<Vec<FeedItem>> {
    let limit = normalize_limit(query.limit)?;
    if limit == 0 {
        return Ok(Vec::new());
    }

    let articles = search_articles(
        &ArticleQuery {
            category: query.category.clone(),
            bias_label: query.bias_label,
            limit: Some(limit),
        },
        pool,
    )
    .await?;

    let votes = match requesting_external_id.map(str::trim) {
        Some(external_id) if !external_id.is_empty() && !articles.is_empty() => {
            let ids: Vec<Uuid> = articles.iter().map(|a| a.id).collect();
            find_votes_for_articles(external_id, &ids, pool).await?
        }
        _ => HashMap::new(),
    };

    Ok(decorate_with_votes(articles, &votes))
}
