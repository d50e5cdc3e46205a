//! エンドポイント登録管理
//!
//! 監視対象エンドポイントの永続ストア（SQLite）とインメモリキャッシュ

pub mod endpoints;

/// 入力値の検証
pub mod validation;

pub use endpoints::EndpointRegistry;
