//! エンドポイント設定の検証
//!
//! API境界とレジストリの両方で同じ規則を適用する。

use healthmon_common::error::ValidationErrors;
use healthmon_common::types::{Endpoint, NewEndpoint, MIN_CHECK_INTERVAL_SECS};
use lettre::Address;
use reqwest::Url;

/// 新規エンドポイント設定を検証
pub fn validate_new(config: &NewEndpoint) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    check_url(&config.url, &mut errors);
    check_interval(config.check_interval_seconds, &mut errors);
    if let Some(email) = config.notification_email.as_deref() {
        check_email("notification_email", email, &mut errors);
    }
    errors
}

/// 更新適用後のエンドポイントを検証
pub fn validate_endpoint(endpoint: &Endpoint) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    check_url(&endpoint.url, &mut errors);
    check_interval(endpoint.check_interval_seconds, &mut errors);
    if let Some(email) = endpoint.notification_email.as_deref() {
        check_email("notification_email", email, &mut errors);
    }
    errors
}

/// メールアドレスの形式チェック（空白のみは未設定扱いなので呼び出し側で除外する）
pub fn check_email(field: &str, email: &str, errors: &mut ValidationErrors) {
    let email = email.trim();
    if email.is_empty() {
        return;
    }
    if email.parse::<Address>().is_err() {
        errors.add(field, "is not a valid email address");
    }
}

fn check_url(url: &str, errors: &mut ValidationErrors) {
    let url = url.trim();
    if url.is_empty() {
        errors.add("url", "can't be blank");
        return;
    }
    match Url::parse(url) {
        Ok(parsed) => {
            if !matches!(parsed.scheme(), "http" | "https") {
                errors.add("url", "must use http or https");
            }
            if parsed.host_str().map_or(true, str::is_empty) {
                errors.add("url", "must include a host");
            }
        }
        Err(_) => errors.add("url", "is not a valid URL"),
    }
}

fn check_interval(interval: u32, errors: &mut ValidationErrors) {
    if interval < MIN_CHECK_INTERVAL_SECS {
        errors.add(
            "check_interval_seconds",
            format!("must be greater than or equal to {}", MIN_CHECK_INTERVAL_SECS),
        );
    }
}
