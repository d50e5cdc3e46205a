//! 共通型定義
//!
//! 監視対象エンドポイントとチェック結果のコアデータ型

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// チェック間隔の下限（秒）
pub const MIN_CHECK_INTERVAL_SECS: u32 = 10;

/// チェック間隔の既定値（秒）
pub const DEFAULT_CHECK_INTERVAL_SECS: u32 = 60;

/// トランスポート失敗を表すステータスコード（HTTPステータスとしては無効）
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// 現在時刻（永続化精度のマイクロ秒に丸める）
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// 監視対象エンドポイント
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Endpoint {
    /// 一意識別子
    pub id: Uuid,
    /// 作成したユーザーのID
    pub owner_id: Uuid,
    /// プローブ対象URL
    pub url: String,
    /// 表示名（空の場合UIはURLを表示する）
    pub name: String,
    /// 監視有効フラグ
    pub active: bool,
    /// 通知先メールアドレス
    pub notification_email: Option<String>,
    /// チェック間隔（秒）
    pub check_interval_seconds: u32,
    /// 作成日時
    #[serde(rename = "inserted_at", alias = "created_at")]
    pub created_at: DateTime<Utc>,
    /// 更新日時
    pub updated_at: DateTime<Utc>,
}

impl Endpoint {
    /// 新規エンドポイントを生成（IDと日時はここで割り当てる）
    pub fn new(owner_id: Uuid, config: NewEndpoint) -> Self {
        let now = now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            url: config.url.trim().to_string(),
            name: config.name,
            active: config.active,
            notification_email: normalize_email(config.notification_email),
            check_interval_seconds: config.check_interval_seconds,
            created_at: now,
            updated_at: now,
        }
    }

    /// 部分更新を適用する（指定されたフィールドのみ変更）
    pub fn apply(&mut self, patch: EndpointPatch) {
        if let Some(url) = patch.url {
            self.url = url.trim().to_string();
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        if let Some(email) = patch.notification_email {
            self.notification_email = normalize_email(email);
        }
        if let Some(interval) = patch.check_interval_seconds {
            self.check_interval_seconds = interval;
        }
        self.updated_at = now();
    }

    /// 表示用ラベル（名前が空ならURL）
    pub fn label(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.url
        } else {
            &self.name
        }
    }
}

/// 空文字のメールアドレスは未設定として扱う
fn normalize_email(email: Option<String>) -> Option<String> {
    email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
}

/// エンドポイント作成時の設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewEndpoint {
    /// プローブ対象URL
    #[serde(default)]
    pub url: String,
    /// 表示名
    #[serde(default)]
    pub name: String,
    /// 監視有効フラグ
    #[serde(default = "default_active")]
    pub active: bool,
    /// 通知先メールアドレス
    #[serde(default)]
    pub notification_email: Option<String>,
    /// チェック間隔（秒）
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u32,
}

fn default_active() -> bool {
    true
}

fn default_check_interval() -> u32 {
    DEFAULT_CHECK_INTERVAL_SECS
}

impl NewEndpoint {
    /// URLのみ指定した設定（他は既定値）
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl Default for NewEndpoint {
    fn default() -> Self {
        Self {
            url: String::new(),
            name: String::new(),
            active: default_active(),
            notification_email: None,
            check_interval_seconds: default_check_interval(),
        }
    }
}

/// エンドポイントの部分更新
///
/// `notification_email` は「未指定」と「null（クリア）」を区別する。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EndpointPatch {
    /// プローブ対象URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// 表示名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 監視有効フラグ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// 通知先（`Some(None)` でクリア）
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub notification_email: Option<Option<String>>,
    /// チェック間隔（秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_interval_seconds: Option<u32>,
}

impl EndpointPatch {
    /// 何も変更しないパッチか
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.name.is_none()
            && self.active.is_none()
            && self.notification_email.is_none()
            && self.check_interval_seconds.is_none()
    }
}

/// フィールドが存在すれば（nullでも）`Some` にする
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// チェック結果（永続化済み）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckResult {
    /// 一意識別子（自動採番）
    pub id: i64,
    /// 対象エンドポイント
    pub endpoint_id: Uuid,
    /// HTTPステータス（トランスポート失敗時は0）
    pub status_code: u16,
    /// 応答時間（ミリ秒、プローブ未完了時はnull）
    pub response_time_ms: Option<u64>,
    /// プローブ完了時刻
    pub checked_at: DateTime<Utc>,
    /// トランスポート失敗の概要
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 削除済みエンドポイントの結果として保持されたか
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub orphaned: bool,
}

impl CheckResult {
    /// ステータス分類
    pub fn status_class(&self) -> StatusClass {
        StatusClass::from_status(self.status_code)
    }

    /// 健全性
    pub fn health(&self, redirect_is_failure: bool) -> Health {
        self.status_class().health(redirect_is_failure)
    }
}

/// 永続化前のチェック結果（Executorの出力）
#[derive(Debug, Clone, PartialEq)]
pub struct NewCheckResult {
    /// 対象エンドポイント
    pub endpoint_id: Uuid,
    /// HTTPステータス（トランスポート失敗時は0）
    pub status_code: u16,
    /// 応答時間（ミリ秒）
    pub response_time_ms: Option<u64>,
    /// プローブ完了時刻
    pub checked_at: DateTime<Utc>,
    /// トランスポート失敗の概要
    pub error: Option<String>,
}

impl NewCheckResult {
    /// HTTP応答を受け取った結果
    pub fn response(endpoint_id: Uuid, status_code: u16, response_time_ms: u64) -> Self {
        Self {
            endpoint_id,
            status_code,
            response_time_ms: Some(response_time_ms),
            checked_at: now(),
            error: None,
        }
    }

    /// トランスポート失敗の結果
    pub fn transport_failure(endpoint_id: Uuid, error: TransportError) -> Self {
        Self {
            endpoint_id,
            status_code: TRANSPORT_FAILURE_STATUS,
            response_time_ms: None,
            checked_at: now(),
            error: Some(error.to_string()),
        }
    }

    /// ステータス分類
    pub fn status_class(&self) -> StatusClass {
        StatusClass::from_status(self.status_code)
    }
}

/// トランスポート失敗の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// タイムアウト
    Timeout,
    /// 接続失敗（DNS / 接続拒否 / TLS）
    Connect,
    /// その他のリクエスト失敗
    Request,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Request => "request",
        };
        f.write_str(s)
    }
}

/// ステータスコードの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// 2xx
    Success,
    /// 3xx
    Redirect,
    /// 4xx
    ClientError,
    /// 5xx
    ServerError,
    /// トランスポート失敗（ステータス0）
    TransportFailure,
    /// 上記以外（1xxなど）
    Other,
}

impl StatusClass {
    /// ステータスコードから分類
    pub fn from_status(status: u16) -> Self {
        match status {
            TRANSPORT_FAILURE_STATUS => Self::TransportFailure,
            200..=299 => Self::Success,
            300..=399 => Self::Redirect,
            400..=499 => Self::ClientError,
            500..=599 => Self::ServerError,
            _ => Self::Other,
        }
    }

    /// 健全性に変換
    pub fn health(self, redirect_is_failure: bool) -> Health {
        match self {
            Self::Success => Health::Healthy,
            Self::Redirect if !redirect_is_failure => Health::Healthy,
            _ => Health::Unhealthy,
        }
    }
}

/// 健全性（通知判定に使う二値分類）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    /// 2xx/3xx
    Healthy,
    /// 4xx/5xx/トランスポート失敗
    Unhealthy,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => f.write_str("healthy"),
            Self::Unhealthy => f.write_str("unhealthy"),
        }
    }
}
