//! エラー型定義
//!
//! 共通層のエラー型（thiserror使用）

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Common layer error type
#[derive(Debug, Error)]
pub enum CommonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// UUID parse error
    #[error("UUID parse error: {0}")]
    UuidParse(#[from] uuid::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),
}

impl From<ValidationErrors> for CommonError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

/// フィールド単位のバリデーションエラー
///
/// `{"url": ["is invalid"], "check_interval_seconds": ["must be at least 10"]}`
/// の形でシリアライズされる。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    /// 空のエラー集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 単一フィールドのエラーから生成
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// エラーを追加
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// エラーが無いか
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 指定フィールドのメッセージ
    pub fn field(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// エラーが無ければ `Ok(())`
    pub fn into_result(self) -> Result<(), CommonError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CommonError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{} {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}
