//! チェック結果ストア
//!
//! エンドポイント単位の追記専用履歴。最新結果はプロセス内キャッシュで保持する。

pub mod store;

pub use store::{AppendOutcome, HistoryCursor, ResultStore};
