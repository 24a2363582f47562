//! ドメインモジュール
//!
//! - `user`: 外部IDから内部ユーザーへの解決
//! - `vote`: 記事ごとの投票の記録
//! - `feed`: 投票付きの記事フィード
//! - `article`: 記事のモデル・保存・取り込み
//! - `assistant`: 要約・Q&A（テキスト生成APIへの受け渡し）
//! - `chat`: 記事ごとのQ&A履歴

pub mod article;
pub mod assistant;
pub mod chat;
pub mod feed;
pub mod user;
pub mod vote;
