//! 設定管理
//!
//! MonitorConfig と各セクションの設定構造体。
//! TOMLファイル（任意）の上に `HEALTHMON__SECTION__KEY` 環境変数を重ねて読み込む。

use crate::error::CommonError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 環境変数のプレフィックス
pub const ENV_PREFIX: &str = "HEALTHMON";

/// healthmon 全体設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// HTTPサーバー設定
    pub server: ServerConfig,
    /// データベース設定
    pub database: DatabaseConfig,
    /// 認証設定
    pub auth: AuthConfig,
    /// スケジューラー設定
    pub scheduler: SchedulerConfig,
    /// プローブ設定
    pub probe: ProbeConfig,
    /// 履歴保持設定
    pub retention: RetentionConfig,
    /// 通知設定
    pub notifier: NotifierConfig,
    /// ログ設定
    pub logging: LoggingConfig,
}

impl MonitorConfig {
    /// 設定を読み込む
    ///
    /// `path` が指定されていればTOMLファイルを必須ソースとして読み、
    /// その上に環境変数を重ねる。読み込み後に検証する。
    pub fn load(path: Option<&Path>) -> Result<Self, CommonError> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// プレフィックスを指定して読み込む
    pub fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self, CommonError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(prefix)
                .separator("__")
                .try_parsing(true),
        );

        let config: MonitorConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CommonError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 設定値を検証する
    pub fn validate(&self) -> Result<(), CommonError> {
        if self.scheduler.tick_millis == 0 {
            return Err(CommonError::Config(
                "scheduler.tick_millis must be greater than 0".to_string(),
            ));
        }
        if self.scheduler.max_concurrent_checks == 0 {
            return Err(CommonError::Config(
                "scheduler.max_concurrent_checks must be greater than 0".to_string(),
            ));
        }
        if self.probe.timeout_secs == 0 {
            return Err(CommonError::Config(
                "probe.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.auth.token_ttl_hours <= 0 {
            return Err(CommonError::Config(
                "auth.token_ttl_hours must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTPサーバー設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// ホストアドレス (デフォルト: "0.0.0.0")
    pub host: String,
    /// ポート番号 (デフォルト: 4000)
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
        }
    }
}

/// データベース設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// データベースURL (デフォルト: "sqlite://healthmon.db")
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://healthmon.db".to_string(),
        }
    }
}

/// 認証設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWTシークレット（未設定なら起動時に生成）
    pub jwt_secret: Option<String>,
    /// トークン有効期限（時間）(デフォルト: 24)
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_hours: 24,
        }
    }
}

/// スケジューラー設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// ディスパッチループの周期（ミリ秒）(デフォルト: 1000)
    pub tick_millis: u64,
    /// 同時実行チェック数の上限 (デフォルト: 32)
    pub max_concurrent_checks: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_millis: 1000,
            max_concurrent_checks: 32,
        }
    }
}

/// プローブのHTTPメソッド
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    /// GET
    #[default]
    #[serde(alias = "GET")]
    Get,
    /// HEAD
    #[serde(alias = "HEAD")]
    Head,
}

/// プローブ設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// タイムアウト（秒）(デフォルト: 5)
    pub timeout_secs: u64,
    /// HTTPメソッド (デフォルト: GET)
    pub method: ProbeMethod,
    /// 3xxを失敗として扱うか (デフォルト: false)
    pub redirect_is_failure: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            method: ProbeMethod::Get,
            redirect_is_failure: false,
        }
    }
}

/// 削除済みエンドポイントの履歴の扱い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// 履歴を削除する
    #[default]
    Purge,
    /// 監査用に履歴を残す
    Retain,
}

/// 履歴保持設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// エンドポイント削除時の履歴ポリシー (デフォルト: purge)
    pub on_delete: RetentionPolicy,
    /// 履歴の最大保持日数（未設定なら無期限）
    pub max_age_days: Option<u32>,
}

/// SMTP設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// SMTPホスト
    pub host: String,
    /// SMTPポート (デフォルト: 587)
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// ユーザー名
    #[serde(default)]
    pub username: Option<String>,
    /// パスワード
    #[serde(default)]
    pub password: Option<String>,
    /// STARTTLSを使うか (デフォルト: true)
    #[serde(default = "default_smtp_tls")]
    pub tls: bool,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_tls() -> bool {
    true
}

/// 通知設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// 送信元アドレス
    pub from: String,
    /// SMTP設定（未設定ならログ出力のみ）
    pub smtp: Option<SmtpConfig>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            from: "healthmon@localhost".to_string(),
            smtp: None,
        }
    }
}

/// ログ設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// ログレベル (デフォルト: "info")
    pub level: String,
    /// JSONログの出力ディレクトリ（未設定なら標準出力のみ）
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}
