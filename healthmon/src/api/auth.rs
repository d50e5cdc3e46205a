//! 認証API
//!
//! ユーザー登録とログイン

use super::error::AppError;
use crate::auth::{jwt, password};
use crate::db::users;
use crate::error::MonitorError;
use crate::registry::validation::check_email;
use crate::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use healthmon_common::error::ValidationErrors;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// 認証リクエスト（ログイン・登録共通）
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    /// メールアドレス
    #[serde(default)]
    pub email: String,
    /// パスワード
    #[serde(default)]
    pub password: String,
}

/// ログインレスポンス
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// JWTトークン
    pub token: String,
    /// ユーザーID
    pub user_id: Uuid,
    /// メールアドレス
    pub email: String,
}

/// POST /api/login - ログイン
///
/// # Returns
/// * `200 OK` - `{token, user_id, email}`
/// * `401 Unauthorized` - メールアドレスまたはパスワードが不正
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(request) = payload?;

    let invalid = || {
        AppError(MonitorError::Authentication(
            "Invalid email or password".to_string(),
        ))
    };

    let user = users::find_by_email(&state.db_pool, &request.email)
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&request.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Login rejected: wrong password");
        return Err(invalid());
    }

    users::update_last_login(&state.db_pool, user.id).await?;
    let token = jwt::create_jwt(user.id, &user.email, &state.jwt_secret, state.token_ttl_hours)?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        email: user.email,
    }))
}

/// POST /api/register - ユーザー登録
///
/// # Returns
/// * `201 Created` - `{data: {id, email}}`
/// * `422 Unprocessable Entity` - 不正なメールアドレス、短いパスワード、登録済み
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(request) = payload?;
    validate_registration(&request)?;

    let hash = password::hash_password(&request.password)?;
    let user = users::create(&state.db_pool, request.email.trim(), &hash).await?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "data": { "id": user.id, "email": user.email }
        })),
    ))
}

fn validate_registration(request: &CredentialsRequest) -> Result<(), MonitorError> {
    let mut errors = ValidationErrors::new();
    if request.email.trim().is_empty() {
        errors.add("email", "can't be blank");
    } else {
        check_email("email", &request.email, &mut errors);
    }
    if request.password.chars().count() < password::MIN_PASSWORD_LENGTH {
        errors.add(
            "password",
            format!(
                "should be at least {} character(s)",
                password::MIN_PASSWORD_LENGTH
            ),
        );
    }
    errors.into_result().map_err(MonitorError::from)
}
