//! データベースアクセス層
//!
//! SQLiteベースのデータ永続化。日時はすべて固定幅のRFC3339（UTC, マイクロ秒）で保存し、
//! 文字列比較がそのまま時系列順になるようにする。

use chrono::{DateTime, SecondsFormat, Utc};

/// ユーザー管理
pub mod users;

/// データベース初期化とマイグレーション
pub mod migrations;

/// エンドポイント管理
pub mod endpoints;

/// チェック結果の永続化
pub mod check_results;

/// 日時をDB保存用の文字列に変換
pub(crate) fn to_db_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// DB保存文字列から日時を復元
pub(crate) fn from_db_timestamp(s: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// DB保存文字列からUUIDを復元
pub(crate) fn from_db_uuid(s: &str) -> Result<uuid::Uuid, sqlx::Error> {
    uuid::Uuid::parse_str(s).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}
