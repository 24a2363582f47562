use crate::types::NewsResult;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// 一時的な競合時の再試行までの待ち時間
pub const CONFLICT_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// 操作を実行し、`ConflictRetryable`の場合のみ待機後に一度だけ再実行する
///
/// 2回目の結果はエラーであってもそのまま返す。
pub async fn retry_once<T, F, Fut>(operation: &str, backoff: Duration, mut attempt: F) -> NewsResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = NewsResult<T>>,
{
    match attempt().await {
        Err(err) if err.is_retryable() => {
            warn!(operation, error = %err, "一時的な競合のため再試行します");
            tokio::time::sleep(backoff).await;
            attempt().await
        }
        other => other,
    }
}
