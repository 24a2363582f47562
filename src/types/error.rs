use thiserror::Error;

/// アプリケーション共通のエラー型
///
/// 投票・フィード・取り込み・AI連携の各操作はこの型でエラーを返す。
/// HTTP層でのステータスコードへの変換は `app::error` で行う。
#[derive(Error, Debug)]
pub enum NewsError {
    /// 認証済みの外部IDが存在しない
    #[error("認証されていないユーザーです")]
    Unauthenticated,

    /// 参照先の記事・ユーザーが存在しない
    #[error("対象が見つかりません: {target}")]
    NotFound { target: String },

    /// 入力値の検証エラー（リトライ不可）
    #[error("入力値が不正です: {reason}")]
    InvalidInput { reason: String },

    /// 一時的な制約違反（upsertを再実行してよい）
    #[error("一時的な競合が発生しました: {operation}")]
    ConflictRetryable {
        operation: String,
        #[source]
        source: sqlx::Error,
    },

    /// 回復不能なストレージエラー
    #[error("データベースエラー: {operation} - {source}")]
    Persistence {
        operation: String,
        #[source]
        source: sqlx::Error,
    },

    /// ストレージまたは外部サービスの待ち時間超過
    #[error("タイムアウトしました: {operation}")]
    Timeout { operation: String },

    /// ニュースAPI・テキスト生成APIの障害や非2xx応答
    #[error("外部サービスエラー: {service} - {message}")]
    UpstreamService { service: String, message: String },
}

impl NewsError {
    /// 対象不在エラーを作成
    pub fn not_found<T: Into<String>>(target: T) -> Self {
        Self::NotFound {
            target: target.into(),
        }
    }

    /// 入力値エラーを作成
    pub fn invalid_input<R: Into<String>>(reason: R) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// タイムアウトエラーを作成
    pub fn timeout<O: Into<String>>(operation: O) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// 外部サービスエラーを作成
    pub fn upstream<S: Into<String>, M: Into<String>>(service: S, message: M) -> Self {
        Self::UpstreamService {
            service: service.into(),
            message: message.into(),
        }
    }

    /// sqlxのエラーを分類して変換する
    ///
    /// - プール取得待ち・ステートメントのキャンセル(57014) → `Timeout`
    /// - 外部キー違反(23503)・行なし → `NotFound`
    /// - シリアライズ失敗(40001)・デッドロック(40P01)・一意制約違反(23505) → `ConflictRetryable`
    /// - それ以外 → `Persistence`
    pub fn from_sqlx<O: Into<String>>(operation: O, source: sqlx::Error) -> Self {
        let operation = operation.into();

        if matches!(source, sqlx::Error::PoolTimedOut) {
            return Self::Timeout { operation };
        }
        if matches!(source, sqlx::Error::RowNotFound) {
            return Self::NotFound { target: operation };
        }

        let code = source
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .map(|code| code.into_owned());

        match code.as_deref() {
            Some("57014") => Self::Timeout { operation },
            Some("23503") => Self::NotFound { target: operation },
            Some("40001") | Some("40P01") | Some("23505") => {
                Self::ConflictRetryable { operation, source }
            }
            _ => Self::Persistence { operation, source },
        }
    }

    /// 一度だけ再試行してよいエラーかどうか
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConflictRetryable { .. })
    }
}

/// 共通エラーのResult型エイリアス
pub type NewsResult<T> = std::result::Result<T, NewsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_sqlx_pool_timeout() {
        let err = NewsError::from_sqlx("投票の保存", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, NewsError::Timeout { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let err = NewsError::from_sqlx("記事の取得", sqlx::Error::RowNotFound);
        assert!(matches!(err, NewsError::NotFound { .. }));
    }

    #[test]
    fn test_from_sqlx_other_errors_are_persistence() {
        let err = NewsError::from_sqlx("記事の保存", sqlx::Error::PoolClosed);
        assert!(matches!(err, NewsError::Persistence { .. }));
        assert!(err.to_string().contains("記事の保存"));
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            NewsError::Unauthenticated.to_string(),
            "認証されていないユーザーです"
        );
        let err = NewsError::upstream("news-api", "status 500");
        assert!(err.to_string().contains("news-api"));
        assert!(err.to_string().contains("status 500"));
    }
}
