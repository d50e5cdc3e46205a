//! ユーザーCRUD操作

use super::{from_db_timestamp, from_db_uuid, to_db_timestamp};
use crate::error::MonitorError;
use chrono::Utc;
use healthmon_common::auth::User;
use sqlx::SqlitePool;
use uuid::Uuid;

/// ユーザーを作成
///
/// # Arguments
/// * `pool` - データベース接続プール
/// * `email` - メールアドレス（小文字に正規化して保存）
/// * `password_hash` - bcryptハッシュ化されたパスワード
///
/// # Returns
/// * `Ok(User)` - 作成されたユーザー
/// * `Err(MonitorError)` - 作成失敗（メールアドレス重複はバリデーションエラー）
pub async fn create(
    pool: &SqlitePool,
    email: &str,
    password_hash: &str,
) -> Result<User, MonitorError> {
    let id = Uuid::new_v4();
    let email = normalize_email(email);
    let created_at = Utc::now();

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, created_at, last_login)
         VALUES (?, ?, ?, ?, NULL)",
    )
    .bind(id.to_string())
    .bind(&email)
    .bind(password_hash)
    .bind(to_db_timestamp(&created_at))
    .execute(pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            MonitorError::validation("email", "has already been taken")
        } else {
            MonitorError::Database(format!("Failed to create user: {}", e))
        }
    })?;

    Ok(User {
        id,
        email,
        password_hash: password_hash.to_string(),
        created_at: from_db_timestamp(&to_db_timestamp(&created_at))?,
        last_login: None,
    })
}

/// メールアドレスでユーザーを検索（大文字小文字を区別しない）
pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, MonitorError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, password_hash, created_at, last_login FROM users WHERE email = ?",
    )
    .bind(normalize_email(email))
    .fetch_optional(pool)
    .await
    .map_err(|e| MonitorError::Database(format!("Failed to find user: {}", e)))?;

    row.map(UserRow::into_user).transpose()
}

/// IDでユーザーを検索
pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<User>, MonitorError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, password_hash, created_at, last_login FROM users WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await
    .map_err(|e| MonitorError::Database(format!("Failed to find user: {}", e)))?;

    row.map(UserRow::into_user).transpose()
}

/// 最終ログイン日時を更新
pub async fn update_last_login(pool: &SqlitePool, id: Uuid) -> Result<(), MonitorError> {
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(to_db_timestamp(&Utc::now()))
        .bind(id.to_string())
        .execute(pool)
        .await
        .map_err(|e| MonitorError::Database(format!("Failed to update last login: {}", e)))?;
    Ok(())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    created_at: String,
    last_login: Option<String>,
}

impl UserRow {
    fn into_user(self) -> Result<User, MonitorError> {
        Ok(User {
            id: from_db_uuid(&self.id)?,
            email: self.email,
            password_hash: self.password_hash,
            created_at: from_db_timestamp(&self.created_at)?,
            last_login: self
                .last_login
                .as_deref()
                .map(from_db_timestamp)
                .transpose()?,
        })
    }
}
