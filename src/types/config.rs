use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// 設定関連のエラー型
/// 環境変数、設定値の検証など設定に関するエラーを定義
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 環境変数が見つからない
    #[error("環境変数が見つかりません: {name}")]
    MissingEnvironmentVariable { name: String },

    /// 設定値が不正
    #[error("設定値が不正です: {reason}")]
    InvalidValue { reason: String },
}

impl ConfigError {
    /// 環境変数不足エラーを作成
    pub fn missing_env_var<N: Into<String>>(name: N) -> Self {
        Self::MissingEnvironmentVariable { name: name.into() }
    }

    /// 不正な設定値エラーを作成
    pub fn invalid_value<R: Into<String>>(reason: R) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }
}

/// 設定エラーのResult型エイリアス
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// データベース接続設定
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub statement_timeout: Duration,
}

/// ニュースAPI設定
#[derive(Debug, Clone)]
pub struct NewsApiConfig {
    pub api_key: String,
    pub base_url: String,
    pub country: String,
    /// CLIの`ingest`で既定として取り込むカテゴリ
    pub categories: Vec<String>,
}

/// テキスト生成API設定
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// アプリケーション全体の設定
///
/// 起動時に一度だけ読み込み、各クライアントの構築に使う。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database: DatabaseConfig,
    pub news_api: NewsApiConfig,
    pub completion: CompletionConfig,
    /// 外部HTTP呼び出しのタイムアウト
    pub http_timeout: Duration,
}

impl AppConfig {
    /// 環境変数から設定を読み込む
    /// .envファイルの読み込みは呼び出し側(main)で行う
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意のキー検索関数から設定を組み立てる
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::missing_env_var("DATABASE_URL"))?;

        let categories = lookup("NEWS_CATEGORIES")
            .map(|raw| {
                raw.split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| vec!["general".to_string()]);

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
                acquire_timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "DB_ACQUIRE_TIMEOUT_SECS",
                    5,
                )?),
                statement_timeout: Duration::from_millis(parse_or(
                    &lookup,
                    "DB_STATEMENT_TIMEOUT_MS",
                    5000,
                )?),
            },
            news_api: NewsApiConfig {
                api_key: lookup("NEWS_API_KEY").unwrap_or_default(),
                base_url: lookup("NEWS_API_BASE_URL")
                    .unwrap_or_else(|| "https://newsapi.org/v2".to_string()),
                country: lookup("NEWS_API_COUNTRY").unwrap_or_else(|| "kr".to_string()),
                categories,
            },
            completion: CompletionConfig {
                api_key: lookup("OPENAI_API_KEY").unwrap_or_default(),
                base_url: lookup("OPENAI_BASE_URL")
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
                model: lookup("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            },
            http_timeout: Duration::from_secs(parse_or(&lookup, "HTTP_TIMEOUT_SECS", 30)?),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> ConfigResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid_value(format!("{}={}", key, raw))),
        _ => Ok(default),
    }
}
