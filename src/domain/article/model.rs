use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// 記事の政治的傾向ラベル
///
/// 取り込み時は常に`Center`。分類による更新は外部の処理が行う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiasLabel {
    Left,
    #[default]
    Center,
    Right,
}

impl BiasLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for BiasLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("不明なバイアスラベル: {0}")]
pub struct ParseBiasLabelError(pub String);

impl FromStr for BiasLabel {
    type Err = ParseBiasLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Self::Left),
            "center" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            other => Err(ParseBiasLabelError(other.to_string())),
        }
    }
}

// 記事エンティティ（articlesテーブルと一致）
// JSONはリクエスト・取り込み結果と同じcamelCase
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: Uuid,
    /// 取り込み順。同じpublished_atの記事の並び順に使う
    #[serde(skip_serializing)]
    pub seq: i64,
    pub title: String,
    pub content: String,
    pub source: String,
    pub source_url: String,
    pub category: String,
    pub published_at: Option<DateTime<Utc>>,
    pub bias_label: BiasLabel,
}

impl<'r> FromRow<'r, PgRow> for Article {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let raw_label: String = row.try_get("bias_label")?;
        let bias_label = raw_label
            .parse::<BiasLabel>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "bias_label".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            id: row.try_get("id")?,
            seq: row.try_get("seq")?,
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            source: row.try_get("source")?,
            source_url: row.try_get("source_url")?,
            category: row.try_get("category")?,
            published_at: row.try_get("published_at")?,
            bias_label,
        })
    }
}

/// ニュースAPIなど外部から受け取る記事表現
///
/// 検証前の値なので全てのフィールドが欠けている可能性がある。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceArticle {
    pub title: Option<String>,
    pub content: Option<String>,
    pub source: Option<String>,
    pub source_url: Option<String>,
    pub published_at: Option<String>,
    pub category: Option<String>,
}

/// 検証済みで保存可能な記事
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub source: String,
    pub source_url: String,
    pub category: String,
    pub published_at: Option<DateTime<Utc>>,
    pub bias_label: BiasLabel,
}

/// 取り込みで除外された行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestFailure {
    /// 入力配列内の位置
    pub index: usize,
    pub source_url: Option<String>,
    pub reason: String,
}

/// 取り込み結果
/// 保存された記事と、検証で除外された行を保持する
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub inserted: Vec<Article>,
    pub failed: Vec<IngestFailure>,
}

impl IngestReport {
    /// ドメイン名を指定して表示用の文字列を生成
    pub fn display_with_domain(&self, domain_name: &str) -> String {
        format!(
            "{}処理完了: 新規{}件、除外{}件",
            domain_name,
            self.inserted.len(),
            self.failed.len()
        )
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_with_domain("記事取り込み"))
    }
}
