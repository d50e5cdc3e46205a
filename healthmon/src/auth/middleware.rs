// 認証ミドルウェア実装

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

/// JWT認証ミドルウェア
///
/// `Authorization: Bearer <jwt>` を検証し、`Claims` をリクエスト拡張に格納する。
pub async fn jwt_auth_middleware(
    State(jwt_secret): State<String>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| unauthorized("Invalid Authorization header format"))?
        .to_string();

    let claims = crate::auth::jwt::verify_jwt(&token, &jwt_secret).map_err(|e| {
        tracing::warn!("JWT verification failed: {}", e);
        unauthorized("Invalid token")
    })?;

    if claims.user_id().is_none() {
        return Err(unauthorized("Invalid token subject"));
    }

    // 検証済みのClaimsをrequestの拡張データに格納
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}
