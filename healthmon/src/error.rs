//! エラー型定義
//!
//! サーバー層の統一エラー型（thiserror使用）。
//! `status_code()` と `external_message()` でHTTPレスポンスへ変換する。

use axum::http::StatusCode;
use healthmon_common::error::{CommonError, ValidationErrors};
use thiserror::Error;
use uuid::Uuid;

/// healthmon error type
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Common layer error
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Endpoint not found
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(Uuid),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Password hash error
    #[error("Password hash error: {0}")]
    PasswordHash(String),

    /// JWT error
    #[error("JWT error: {0}")]
    Jwt(String),

    /// Authentication error
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Notification delivery error
    #[error("Notification error: {0}")]
    Notification(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MonitorError {
    /// 単一フィールドのバリデーションエラー
    pub fn validation(field: &str, message: &str) -> Self {
        Self::Common(CommonError::Validation(ValidationErrors::single(
            field, message,
        )))
    }

    /// バリデーションエラーの詳細（422で返す）
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Common(CommonError::Validation(errors)) => Some(errors),
            _ => None,
        }
    }

    /// Returns a safe error message for external clients.
    ///
    /// Internal details such as SQL errors stay in the server logs.
    pub fn external_message(&self) -> &'static str {
        match self {
            Self::Common(CommonError::Validation(_)) => "Validation failed",
            Self::Common(_) => "Request error",
            Self::EndpointNotFound(_) => "Endpoint not found",
            Self::NotFound(_) => "Not found",
            Self::Database(_) => "Database error",
            Self::PasswordHash(_) => "Authentication error",
            Self::Jwt(_) => "Authentication error",
            Self::Authentication(_) => "Authentication failed",
            Self::Notification(_) => "Notification error",
            Self::Internal(_) => "Internal server error",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Common(CommonError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Common(_) => StatusCode::BAD_REQUEST,
            Self::EndpointNotFound(_) => StatusCode::NOT_FOUND,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PasswordHash(_) => StatusCode::UNAUTHORIZED,
            Self::Jwt(_) => StatusCode::UNAUTHORIZED,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Notification(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for MonitorError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}
