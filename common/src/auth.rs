//! 認証関連のデータモデル

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// ユーザー
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// ユーザーID
    pub id: Uuid,
    /// メールアドレス（小文字に正規化済み）
    pub email: String,
    /// パスワードハッシュ（bcrypt）
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// 作成日時
    pub created_at: DateTime<Utc>,
    /// 最終ログイン日時
    pub last_login: Option<DateTime<Utc>>,
}

/// JWTクレーム
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// ユーザーID（JWT sub claim）
    pub sub: String,
    /// メールアドレス
    pub email: String,
    /// 有効期限（UNIX timestamp）
    pub exp: usize,
}

impl Claims {
    /// `sub` をユーザーIDとして解釈する
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}
