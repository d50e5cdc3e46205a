// JWT生成と検証（jsonwebtoken実装）

use crate::error::MonitorError;
use chrono::Utc;
use healthmon_common::auth::Claims;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

/// JWTトークンを生成
///
/// # Arguments
/// * `user_id` - ユーザーID
/// * `email` - メールアドレス
/// * `secret` - JWTシークレットキー
/// * `ttl_hours` - 有効期限（時間）
pub fn create_jwt(
    user_id: Uuid,
    email: &str,
    secret: &str,
    ttl_hours: i64,
) -> Result<String, MonitorError> {
    let expiration = Utc::now()
        .checked_add_signed(chrono::Duration::hours(ttl_hours))
        .ok_or_else(|| MonitorError::Jwt("Failed to calculate expiration time".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| MonitorError::Jwt(format!("Failed to create JWT: {}", e)))
}

/// JWTトークンを検証
///
/// # Returns
/// * `Ok(Claims)` - 検証済みクレーム
/// * `Err(MonitorError)` - 検証失敗（無効なトークン、期限切れなど）
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, MonitorError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| MonitorError::Jwt(format!("Failed to verify JWT: {}", e)))
}
