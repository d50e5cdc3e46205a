// パスワードハッシュ化と検証（bcrypt実装）

use crate::error::MonitorError;
use bcrypt::{hash, verify};

/// パスワードハッシュ化のコスト（12推奨、200-300ms）
const HASH_COST: u32 = 12;

/// パスワードの最小文字数
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// パスワードをbcryptでハッシュ化
///
/// # Returns
/// * `Ok(String)` - bcryptハッシュ文字列（$2b$で始まる）
/// * `Err(MonitorError)` - ハッシュ化失敗
pub fn hash_password(password: &str) -> Result<String, MonitorError> {
    hash_password_with_cost(password, HASH_COST)
}

pub(crate) fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, MonitorError> {
    hash(password, cost)
        .map_err(|e| MonitorError::PasswordHash(format!("Failed to hash password: {}", e)))
}

/// パスワードを検証
///
/// # Returns
/// * `Ok(true)` - パスワード一致
/// * `Ok(false)` - パスワード不一致
/// * `Err(MonitorError)` - 検証失敗（不正なハッシュなど）
pub fn verify_password(password: &str, hash: &str) -> Result<bool, MonitorError> {
    verify(password, hash)
        .map_err(|e| MonitorError::PasswordHash(format!("Failed to verify password: {}", e)))
}
