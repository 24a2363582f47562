use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};

/// 文字列を日付型に変換するヘルパー関数
///
/// 次の順で解析を試み、`DateTime<Utc>`に変換する。
/// 1. RFC 3339（"2025-01-15T10:00:00Z"）
/// 2. 日付のみ（"2025-01-15"）→ UTCの0時
/// 3. `dateparser`による推定（RFC 2822など）
///
/// 日付のみの文字列を`dateparser`に渡すと現在時刻で補完されるため、
/// 取り込みのたびに値が変わらないよう先に0時として扱う。
///
/// # 引数
/// - `date_str`: 解析対象の日付文字列
///
/// # 戻り値
/// - `Ok(DateTime<Utc>)`: 解析が成功した場合
/// - `Err(anyhow::Error)`: 解析に失敗した場合
pub fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("日付が空です"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    // `dateparser`はタイムゾーンを持つ`DateTime`を返すため、UTCに変換する
    match dateparser::parse(trimmed) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(_) => Err(anyhow!("不正な日付形式: {}", date_str)),
    }
}

/// 空文字列を「日付なし」として扱う版
///
/// - `None`または空白のみ → `Ok(None)`
/// - 解析できない文字列 → `Err`
pub fn parse_optional_date(date_str: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match date_str.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_date(value).map(Some),
    }
}
