use crate::domain::user::{require_identity, resolve_user};
use crate::infra::retry::{retry_once, CONFLICT_RETRY_BACKOFF};
use crate::types::{NewsError, NewsResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

// 投票（votesテーブルと一致）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub user_id: Uuid,
    pub article_id: Uuid,
    pub vote_value: bool,
    pub created_at: DateTime<Utc>,
}

/// # 概要
/// ユーザーの記事に対する投票を記録する。
///
/// ## 動作
/// - 外部IDが無ければ`Unauthenticated`（何も書き込まない）
/// - ユーザーの解決と投票のupsertを1つのトランザクションで行う
/// - 既存の投票があれば値と日時を上書きする
/// - 一時的な競合の場合はトランザクションごと一度だけ再試行する
///
/// ## エラー
/// - 記事が存在しない → `NotFound`
/// - 書き込み失敗 → `Persistence`（ロールバック済み）
pub async fn record_vote(
    external_id: Option<&str>,
    article_id: Uuid,
    vote_value: bool,
    pool: &PgPool,
) -> NewsResult<Vote> {
    let external_id = require_identity(external_id)?;

    retry_once("投票の保存", CONFLICT_RETRY_BACKOFF, || {
        record_vote_once(external_id, article_id, vote_value, pool)
    })
    .await
}

async fn record_vote_once(
    external_id: &str,
    article_id: Uuid,
    vote_value: bool,
    pool: &PgPool,
) -> NewsResult<Vote> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| NewsError::from_sqlx("トランザクションの開始", e))?;

    let user = resolve_user(external_id, &mut *tx).await?;

    let vote = sqlx::query_as::<_, Vote>(
        r#"
        INSERT INTO votes (user_id, article_id, vote_value, created_at)
        VALUES ($1, $2, $3, CURRENT_TIMESTAMP)
        ON CONFLICT (user_id, article_id) DO UPDATE SET
            vote_value = EXCLUDED.vote_value,
            created_at = EXCLUDED.created_at
        RETURNING user_id, article_id, vote_value, created_at
        "#,
    )
    .bind(user.id)
    .bind(article_id)
    .bind(vote_value)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match NewsError::from_sqlx("投票の保存", e) {
        NewsError::NotFound { .. } => NewsError::not_found(format!("記事 {}", article_id)),
        other => other,
    })?;

    tx.commit()
        .await
        .map_err(|e| NewsError::from_sqlx("トランザクションのコミット", e))?;

    Ok(vote)
}

/// 指定ユーザーの、指定記事群に対する投票をまとめて取得する
///
/// 1回のクエリで取得する。投票が無い記事はマップに含まれない。
/// ユーザーが存在しない場合も空のマップを返す（ユーザーは作成しない）。
pub async fn find_votes_for_articles(
    external_id: &str,
    article_ids: &[Uuid],
    pool: &PgPool,
) -> NewsResult<HashMap<Uuid, bool>> {
    if article_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, (Uuid, bool)>(
        r#"
        SELECT v.article_id, v.vote_value
        FROM votes v
        JOIN users u ON u.id = v.user_id
        WHERE u.external_id = $1 AND v.article_id = ANY($2)
        "#,
    )
    .bind(external_id)
    .bind(article_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| NewsError::from_sqlx("投票の一括取得", e))?;

    Ok(rows.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn test_record_vote_without_identity() {
        // 認証エラーはデータベースに触れる前に返る
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://nobody@127.0.0.1:1/unused")
            .unwrap();

        for identity in [None, Some(""), Some("  ")] {
            let result = record_vote(identity, Uuid::new_v4(), true, &pool).await;
            assert!(matches!(result, Err(NewsError::Unauthenticated)));
        }
    }

    #[cfg(feature = "online")]
    mod db_tests {
        use super::*;

        fn article_id(n: u8) -> Uuid {
            format!("00000000-0000-0000-0000-00000000000{}", n)
                .parse()
                .unwrap()
        }

        #[sqlx::test(fixtures("../../fixtures/articles.sql"))]
        async fn test_vote_twice_keeps_latest(pool: PgPool) -> Result<(), anyhow::Error> {
            let first = record_vote(Some("ext-1"), article_id(2), true, &pool).await?;
            let second = record_vote(Some("ext-1"), article_id(2), false, &pool).await?;

            assert!(first.vote_value);
            assert!(!second.vote_value);
            assert_eq!(first.user_id, second.user_id);
            assert!(second.created_at >= first.created_at);

            let rows: Vec<(bool,)> =
                sqlx::query_as("SELECT vote_value FROM votes WHERE article_id = $1")
                    .bind(article_id(2))
                    .fetch_all(&pool)
                    .await?;
            assert_eq!(rows, vec![(false,)], "1行のみで最新の値");

            println!("✅ 投票上書きテスト成功");
            Ok(())
        }

        #[sqlx::test(fixtures("../../fixtures/articles.sql"))]
        async fn test_vote_for_missing_article(pool: PgPool) -> Result<(), anyhow::Error> {
            let result = record_vote(Some("ext-9"), Uuid::new_v4(), true, &pool).await;
            assert!(matches!(result, Err(NewsError::NotFound { .. })));

            // 失敗した投票のユーザーも残らない
            let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
                .fetch_one(&pool)
                .await?;
            assert_eq!(users, 0, "ロールバックされるべき");
            Ok(())
        }

        #[sqlx::test(fixtures("../../fixtures/articles.sql"))]
        async fn test_concurrent_votes_single_row(pool: PgPool) -> Result<(), anyhow::Error> {
            let tasks: Vec<_> = (0..6)
                .map(|i| {
                    let pool = pool.clone();
                    tokio::spawn(async move {
                        record_vote(Some("ext-race"), article_id(1), i % 2 == 0, &pool).await
                    })
                })
                .collect();
            for task in tasks {
                task.await??;
            }

            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes")
                .fetch_one(&pool)
                .await?;
            assert_eq!(count, 1);
            Ok(())
        }

        #[sqlx::test(fixtures("../../fixtures/articles.sql", "../../fixtures/votes.sql"))]
        async fn test_find_votes_for_articles(pool: PgPool) -> Result<(), anyhow::Error> {
            let ids: Vec<Uuid> = (1..=5).map(article_id).collect();

            let votes = find_votes_for_articles("ext-1", &ids, &pool).await?;
            assert_eq!(votes.len(), 2);
            assert_eq!(votes.get(&article_id(2)), Some(&true));
            assert_eq!(votes.get(&article_id(3)), Some(&false));
            assert_eq!(votes.get(&article_id(1)), None);

            let unknown = find_votes_for_articles("nobody", &ids, &pool).await?;
            assert!(unknown.is_empty());
            Ok(())
        }
    }
}
