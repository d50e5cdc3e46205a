//! healthmon server
//!
//! 登録されたHTTPエンドポイントを定期的にプローブし、結果履歴を保存して
//! 状態変化を通知するバックエンド。

#![warn(missing_docs)]

/// REST APIハンドラー
pub mod api;

/// 認証・認可機能
pub mod auth;

/// CLIインターフェース
pub mod cli;

/// データベースアクセス
pub mod db;

/// エラー型定義
pub mod error;

/// ヘルスチェック（プローブ・スケジューラー）
pub mod health;

/// ロギング初期化ユーティリティ
pub mod logging;

/// 状態変化の通知
pub mod notify;

/// エンドポイント登録管理
pub mod registry;

/// チェック結果ストア
pub mod results;

/// axumサーバー起動
pub mod server;

/// Shutdown controller
pub mod shutdown;

/// アプリケーション状態
#[derive(Clone)]
pub struct AppState {
    /// エンドポイントレジストリ
    pub registry: registry::EndpointRegistry,
    /// チェック結果ストア
    pub results: results::ResultStore,
    /// スケジューラーの起床ハンドル
    pub scheduler: health::SchedulerTrigger,
    /// データベース接続プール
    pub db_pool: sqlx::SqlitePool,
    /// JWT秘密鍵
    pub jwt_secret: String,
    /// JWT有効期限（時間）
    pub token_ttl_hours: i64,
    /// Cooperative shutdown controller
    pub shutdown: shutdown::ShutdownController,
}
