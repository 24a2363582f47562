use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

/// IDプロバイダで検証済みの外部IDを運ぶヘッダ
/// 前段のプロキシが設定する値をそのまま信頼する
pub const IDENTITY_HEADER: &str = "x-external-user-id";

/// リクエストの外部ID
///
/// ヘッダが無い・空の場合は`None`。認証の要否は各操作が判断する。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity(pub Option<String>);

impl Identity {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let external_id = parts
            .headers
            .get(IDENTITY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(Self(external_id))
    }
}
