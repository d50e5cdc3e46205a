//! APIエラーレスポンス型
//!
//! axum用の共通エラーハンドリング

use crate::error::MonitorError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

/// Axum用のエラーレスポンス型
#[derive(Debug)]
pub struct AppError(pub MonitorError);

impl From<MonitorError> for AppError {
    fn from(err: MonitorError) -> Self {
        AppError(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError(MonitorError::validation("body", &rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError(MonitorError::validation("query", &rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        // 内部の詳細（SQLエラーなど）はログにのみ出す
        let status = self.0.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "Request failed");
        }

        let payload = match self.0.validation_errors() {
            Some(errors) => json!({
                "error": self.0.external_message(),
                "errors": errors,
            }),
            None => json!({
                "error": self.0.external_message(),
            }),
        };

        (status, Json(payload)).into_response()
    }
}
