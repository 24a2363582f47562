//! 型定義モジュール
//!
//! アプリケーション全体で使用される共通的な型定義を管理します。
//! - エラー型: 投票・フィード・取り込みで共通のエラー分類
//! - 設定型: 環境変数から読み込む設定値

pub mod config;
pub mod error;

// 便利な再エクスポート
pub use config::{AppConfig, ConfigError, ConfigResult};
pub use error::{NewsError, NewsResult};
