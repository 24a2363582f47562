use crate::domain::user::{require_identity, resolve_user};
use crate::infra::retry::{retry_once, CONFLICT_RETRY_BACKOFF};
use crate::types::{NewsError, NewsResult};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

/// 1記事あたりに保存できる最大メッセージ数
pub const MAX_CHAT_MESSAGES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Q&A履歴の1メッセージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// 回答時に表示していた要約
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// ユーザーの記事ごとのQ&A履歴を取得する
///
/// 履歴が無い場合や未登録ユーザーの場合は空の配列を返す。
pub async fn get_chat_history(
    external_id: Option<&str>,
    article_id: Uuid,
    pool: &PgPool,
) -> NewsResult<Vec<ChatMessage>> {
    let external_id = require_identity(external_id)?;

    let messages = sqlx::query_scalar::<_, Json<Vec<ChatMessage>>>(
        r#"
        SELECT c.messages
        FROM chat_histories c
        JOIN users u ON u.id = c.user_id
        WHERE u.external_id = $1 AND c.article_id = $2
        "#,
    )
    .bind(external_id)
    .bind(article_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| NewsError::from_sqlx("Q&A履歴の取得", e))?;

    Ok(messages.map(|Json(list)| list).unwrap_or_default())
}

/// ユーザーの記事ごとのQ&A履歴を保存する（全体を置き換える）
///
/// ユーザーの解決と履歴のupsertは1つのトランザクションで行う。
pub async fn save_chat_history(
    external_id: Option<&str>,
    article_id: Uuid,
    messages: &[ChatMessage],
    pool: &PgPool,
) -> NewsResult<()> {
    let external_id = require_identity(external_id)?;
    if messages.len() > MAX_CHAT_MESSAGES {
        return Err(NewsError::invalid_input(format!(
            "メッセージ数が上限({})を超えています: {}",
            MAX_CHAT_MESSAGES,
            messages.len()
        )));
    }

    retry_once("Q&A履歴の保存", CONFLICT_RETRY_BACKOFF, || {
        save_chat_history_once(external_id, article_id, messages, pool)
    })
    .await
}

async fn save_chat_history_once(
    external_id: &str,
    article_id: Uuid,
    messages: &[ChatMessage],
    pool: &PgPool,
) -> NewsResult<()> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| NewsError::from_sqlx("トランザクションの開始", e))?;

    let user = resolve_user(external_id, &mut *tx).await?;

    sqlx::query(
        r#"
        INSERT INTO chat_histories (user_id, article_id, messages, updated_at)
        VALUES ($1, $2, $3, CURRENT_TIMESTAMP)
        ON CONFLICT (user_id, article_id) DO UPDATE SET
            messages = EXCLUDED.messages,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(user.id)
    .bind(article_id)
    .bind(Json(messages))
    .execute(&mut *tx)
    .await
    .map_err(|e| match NewsError::from_sqlx("Q&A履歴の保存", e) {
        NewsError::NotFound { .. } => NewsError::not_found(format!("記事 {}", article_id)),
        other => other,
    })?;

    tx.commit()
        .await
        .map_err(|e| NewsError::from_sqlx("トランザクションのコミット", e))
}
