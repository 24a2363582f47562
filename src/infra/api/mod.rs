pub mod completion;
pub mod news;

use crate::types::NewsError;

/// reqwestのエラーを外部サービスエラーに変換する
/// タイムアウトは`Timeout`として区別する
pub(crate) fn upstream_error(service: &str, err: reqwest::Error) -> NewsError {
    if err.is_timeout() {
        NewsError::timeout(format!("{}への要求", service))
    } else {
        NewsError::upstream(service, err.to_string())
    }
}
