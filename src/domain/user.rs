use crate::types::{NewsError, NewsResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

/// SELECT/RETURNINGで使う列
const USER_COLUMNS: &str = "id, external_id, nickname, preferences, created_at";

/// 表示名の最大文字数
pub const MAX_NICKNAME_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPreferences {
    pub email: bool,
    pub push: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            push: true,
        }
    }
}

/// ユーザー設定（usersテーブルのpreferences列、JSONB）
/// 欠けたキーは既定値で補う
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub notifications: NotificationPreferences,
    pub theme: Theme,
}

// 内部ユーザー（usersテーブルと一致）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub external_id: String,
    pub nickname: Option<String>,
    pub preferences: Json<UserPreferences>,
    pub created_at: DateTime<Utc>,
}

/// プロフィールの更新内容
/// 指定しなかった項目は現在の値を保つ
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub nickname: Option<String>,
    pub preferences: Option<UserPreferences>,
}

/// 外部IDが存在することを確認する
/// 無い・空白のみの場合は`Unauthenticated`
pub fn require_identity(external_id: Option<&str>) -> NewsResult<&str> {
    match external_id.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(NewsError::Unauthenticated),
    }
}

// 空白は取り除き、空や長すぎる表示名は拒否する
fn normalize_nickname(nickname: Option<&str>) -> NewsResult<Option<String>> {
    let Some(raw) = nickname else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NewsError::invalid_input("nicknameが空です"));
    }
    if trimmed.chars().count() > MAX_NICKNAME_CHARS {
        return Err(NewsError::invalid_input(format!(
            "nicknameは{}文字以内である必要があります",
            MAX_NICKNAME_CHARS
        )));
    }
    Ok(Some(trimmed.to_string()))
}

/// # 概要
/// 外部IDに対応する内部ユーザーを取得する。無ければ作成する。
///
/// ## 動作
/// external_idの一意制約を使った1文のupsertで行うため、
/// 同じ外部IDで同時に呼ばれても重複したユーザーは作られない。
///
/// ## 引数
/// - `external_id`: IDプロバイダが発行した外部ID
/// - `executor`: プールまたはトランザクション
pub async fn resolve_user<'e, E>(external_id: &str, executor: E) -> NewsResult<User>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (external_id)
        VALUES ($1)
        ON CONFLICT (external_id) DO UPDATE SET external_id = EXCLUDED.external_id
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(external_id)
    .fetch_one(executor)
    .await
    .map_err(|e| NewsError::from_sqlx("ユーザーの取得または作成", e))
}

/// 外部IDに対応する内部ユーザーを取得する（作成はしない）
pub async fn find_user<'e, E>(external_id: &str, executor: E) -> NewsResult<Option<User>>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE external_id = $1",
        USER_COLUMNS
    ))
    .bind(external_id)
    .fetch_optional(executor)
    .await
    .map_err(|e| NewsError::from_sqlx("ユーザーの取得", e))
}

/// # 概要
/// 表示名と設定を保存する。ユーザーが無ければ作成する。
///
/// ## 動作
/// - 外部IDが無ければ`Unauthenticated`
/// - external_idをキーにした1文のupsertで行う
/// - 指定されなかった項目は現在の値（新規なら既定値）のまま
pub async fn update_profile(
    external_id: Option<&str>,
    update: &ProfileUpdate,
    pool: &PgPool,
) -> NewsResult<User> {
    let external_id = require_identity(external_id)?;
    let nickname = normalize_nickname(update.nickname.as_deref())?;

    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (external_id, nickname, preferences)
        VALUES ($1, $2, COALESCE($3, $4))
        ON CONFLICT (external_id) DO UPDATE SET
            nickname = COALESCE($2, users.nickname),
            preferences = COALESCE($3, users.preferences)
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(external_id)
    .bind(nickname)
    .bind(update.preferences.clone().map(Json))
    .bind(Json(UserPreferences::default()))
    .fetch_one(pool)
    .await
    .map_err(|e| NewsError::from_sqlx("プロフィールの保存", e))
}
