use crate::types::NewsError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

impl NewsError {
    /// HTTPステータスコードへの対応
    pub fn status_code(&self) -> StatusCode {
        match self {
            NewsError::Unauthenticated => StatusCode::UNAUTHORIZED,
            NewsError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            NewsError::NotFound { .. } => StatusCode::NOT_FOUND,
            NewsError::ConflictRetryable { .. } => StatusCode::CONFLICT,
            NewsError::UpstreamService { .. } => StatusCode::BAD_GATEWAY,
            NewsError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            NewsError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for NewsError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // ストレージの詳細はクライアントに返さない
        let message = match &self {
            NewsError::Persistence { .. } => {
                error!(error = %self, "リクエスト処理中にデータベースエラーが発生しました");
                "内部エラーが発生しました".to_string()
            }
            NewsError::UpstreamService { .. }
            | NewsError::Timeout { .. }
            | NewsError::ConflictRetryable { .. } => {
                error!(error = %self, "リクエスト処理に失敗しました");
                self.to_string()
            }
            _ => {
                warn!(error = %self, "リクエストを拒否しました");
                self.to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
