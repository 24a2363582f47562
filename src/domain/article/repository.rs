use super::model::{Article, BiasLabel, NewArticle};
use crate::types::{NewsError, NewsResult};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

/// SELECT/RETURNINGで使う列
pub(crate) const ARTICLE_COLUMNS: &str =
    "id, seq, title, content, source, source_url, category, published_at, bias_label";

/// フィードの並び順
/// 日付なしは末尾、同時刻は取り込み順（古いものが先）
const FEED_ORDER: &str = " ORDER BY published_at DESC NULLS LAST, seq ASC";

// 1文あたりのバインド数がPostgreSQLの上限(65535)を超えないように分割する
const INSERT_CHUNK_SIZE: usize = 1000;

// 記事検索の条件を表す構造体
#[derive(Debug, Default, Clone)]
pub struct ArticleQuery {
    pub category: Option<String>,
    pub bias_label: Option<BiasLabel>,
    pub limit: Option<i64>,
}

/// 検証済みの記事を一括保存する。
///
/// ## 動作
/// - 全ての記事を1つのトランザクションで保存する
/// - 保存できなかった場合はロールバックし、1件も保存しない
/// - 同じsource_urlの記事も重複保存される
///
/// ## 戻り値
/// - 保存された記事（取り込み順）
pub async fn insert_articles(articles: &[NewArticle], pool: &PgPool) -> NewsResult<Vec<Article>> {
    if articles.is_empty() {
        return Ok(Vec::new());
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| NewsError::from_sqlx("トランザクションの開始", e))?;
    let mut inserted = Vec::with_capacity(articles.len());

    for chunk in articles.chunks(INSERT_CHUNK_SIZE) {
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO articles (title, content, source, source_url, category, published_at, bias_label) ",
        );
        qb.push_values(chunk, |mut row, article| {
            row.push_bind(article.title.as_str())
                .push_bind(article.content.as_str())
                .push_bind(article.source.as_str())
                .push_bind(article.source_url.as_str())
                .push_bind(article.category.as_str())
                .push_bind(article.published_at)
                .push_bind(article.bias_label.as_str());
        });
        qb.push(" RETURNING ");
        qb.push(ARTICLE_COLUMNS);

        let rows = qb
            .build_query_as::<Article>()
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| NewsError::from_sqlx("記事の一括保存", e))?;
        inserted.extend(rows);
    }

    tx.commit()
        .await
        .map_err(|e| NewsError::from_sqlx("トランザクションのコミット", e))?;

    inserted.sort_by_key(|article| article.seq);
    Ok(inserted)
}

/// 条件に合う記事を新しい順に取得する
pub async fn search_articles(query: &ArticleQuery, pool: &PgPool) -> NewsResult<Vec<Article>> {
    let mut qb =
        QueryBuilder::<Postgres>::new(format!("SELECT {} FROM articles", ARTICLE_COLUMNS));

    let has_cond = query.category.is_some() || query.bias_label.is_some();
    if has_cond {
        qb.push(" WHERE ");
        let mut separated = qb.separated(" AND ");

        if let Some(ref category) = query.category {
            separated.push("category = ").push_bind_unseparated(category.clone());
        }
        if let Some(label) = query.bias_label {
            separated
                .push("bias_label = ")
                .push_bind_unseparated(label.as_str());
        }
    }

    qb.push(FEED_ORDER);

    if let Some(limit) = query.limit {
        qb.push(" LIMIT ").push_bind(limit);
    }

    qb.build_query_as::<Article>()
        .fetch_all(pool)
        .await
        .map_err(|e| NewsError::from_sqlx("記事の検索", e))
}

/// IDを指定して記事を取得する
pub async fn get_article(id: Uuid, pool: &PgPool) -> NewsResult<Option<Article>> {
    sqlx::query_as::<_, Article>(&format!(
        "SELECT {} FROM articles WHERE id = $1",
        ARTICLE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| NewsError::from_sqlx("記事の取得", e))
}

#[cfg(all(test, feature = "online"))]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn new_article(title: &str, url: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            content: "本文".to_string(),
            source: "テスト通信".to_string(),
            source_url: url.to_string(),
            category: "general".to_string(),
            published_at: Some(Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap()),
            bias_label: BiasLabel::Center,
        }
    }

    // 日付ソートの検証ヘルパー関数
    fn validate_feed_order(articles: &[Article]) {
        for pair in articles.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            match (prev.published_at, next.published_at) {
                (Some(p), Some(n)) => {
                    assert!(n <= p, "日付の降順ソートが正しくありません");
                    if n == p {
                        assert!(prev.seq < next.seq, "同時刻は取り込み順であるべき");
                    }
                }
                (None, Some(_)) => panic!("日付なしの記事は末尾であるべき"),
                (None, None) => assert!(prev.seq < next.seq),
                (Some(_), None) => {}
            }
        }
    }

    mod save_tests {
        use super::*;

        #[sqlx::test]
        async fn test_insert_articles(pool: PgPool) -> Result<(), anyhow::Error> {
            let articles = vec![
                new_article("記事1", "https://news.example.com/1"),
                new_article("記事2", "https://news.example.com/2"),
            ];

            let inserted = insert_articles(&articles, &pool).await?;

            assert_eq!(inserted.len(), 2);
            assert_eq!(inserted[0].title, "記事1");
            assert_eq!(inserted[1].title, "記事2");
            assert!(inserted[0].seq < inserted[1].seq);
            assert!(inserted.iter().all(|a| a.bias_label == BiasLabel::Center));

            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
                .fetch_one(&pool)
                .await?;
            assert_eq!(count, 2);

            println!("✅ 記事一括保存テスト成功");
            Ok(())
        }

        #[sqlx::test]
        async fn test_duplicate_source_url_is_stored_twice(
            pool: PgPool,
        ) -> Result<(), anyhow::Error> {
            let article = new_article("重複記事", "https://news.example.com/dup");
            insert_articles(&[article.clone()], &pool).await?;
            insert_articles(&[article], &pool).await?;

            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE source_url = $1")
                    .bind("https://news.example.com/dup")
                    .fetch_one(&pool)
                    .await?;
            assert_eq!(count, 2, "取り込み側では重複排除しない");

            println!("✅ 重複保存テスト成功");
            Ok(())
        }

        #[sqlx::test]
        async fn test_empty_articles(pool: PgPool) -> Result<(), anyhow::Error> {
            let inserted = insert_articles(&[], &pool).await?;
            assert!(inserted.is_empty());
            Ok(())
        }
    }

    mod retrieval_tests {
        use super::*;

        #[sqlx::test(fixtures("../../../fixtures/articles.sql"))]
        async fn test_search_articles_order(pool: PgPool) -> Result<(), anyhow::Error> {
            let articles = search_articles(&ArticleQuery::default(), &pool).await?;

            let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
            assert_eq!(
                titles,
                vec!["最新記事", "同時刻記事A", "同時刻記事B", "古い記事", "日付なし記事"]
            );
            validate_feed_order(&articles);

            println!("✅ 記事並び順テスト成功");
            Ok(())
        }

        #[sqlx::test(fixtures("../../../fixtures/articles.sql"))]
        async fn test_search_articles_filters(pool: PgPool) -> Result<(), anyhow::Error> {
            let politics = search_articles(
                &ArticleQuery {
                    category: Some("politics".to_string()),
                    ..Default::default()
                },
                &pool,
            )
            .await?;
            assert_eq!(politics.len(), 2);

            let left = search_articles(
                &ArticleQuery {
                    bias_label: Some(BiasLabel::Left),
                    ..Default::default()
                },
                &pool,
            )
            .await?;
            assert_eq!(left.len(), 1);
            assert_eq!(left[0].title, "同時刻記事A");

            let limited = search_articles(
                &ArticleQuery {
                    limit: Some(2),
                    ..Default::default()
                },
                &pool,
            )
            .await?;
            assert_eq!(limited.len(), 2);

            Ok(())
        }

        #[sqlx::test(fixtures("../../../fixtures/articles.sql"))]
        async fn test_get_article(pool: PgPool) -> Result<(), anyhow::Error> {
            let id: Uuid = "00000000-0000-0000-0000-000000000005".parse()?;
            let article = get_article(id, &pool).await?;
            assert_eq!(article.map(|a| a.title), Some("古い記事".to_string()));

            let missing = get_article(Uuid::new_v4(), &pool).await?;
            assert!(missing.is_none());
            Ok(())
        }
    }
}
