//! healthmon 共通ライブラリ
//!
//! サーバーとテストで共有するドメイン型・エラー型・設定

#![warn(missing_docs)]

/// 認証関連のデータモデル
pub mod auth;

/// 設定管理
pub mod config;

/// エラー型定義
pub mod error;

/// 共通型定義（Endpoint / CheckResult）
pub mod types;
