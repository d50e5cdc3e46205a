//! REST APIハンドラー
//!
//! すべてのルートは `/api` 配下。`/api/login`・`/api/register`・`/api/health` 以外は
//! Bearer JWTが必要。

pub mod auth;
pub mod check_results;
pub mod endpoints;
pub mod error;

use crate::auth::middleware::jwt_auth_middleware;
use crate::error::MonitorError;
use crate::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use healthmon_common::auth::Claims;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// アプリケーションのルーターを構築
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/endpoints",
            get(endpoints::list_endpoints).post(endpoints::create_endpoint),
        )
        .route(
            "/endpoints/:id",
            get(endpoints::get_endpoint)
                .put(endpoints::update_endpoint)
                .delete(endpoints::delete_endpoint),
        )
        .route(
            "/check_results/:endpoint_id",
            get(check_results::list_check_results),
        )
        .layer(middleware::from_fn_with_state(
            state.jwt_secret.clone(),
            jwt_auth_middleware,
        ));

    let public = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/health", get(health));

    Router::new()
        .nest("/api", public.merge(protected))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /api/health - 認証不要の死活確認
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// 検証済みクレームから所有者IDを取り出す
pub(crate) fn owner_id(claims: &Claims) -> Result<Uuid, MonitorError> {
    claims
        .user_id()
        .ok_or_else(|| MonitorError::Authentication("Invalid token subject".to_string()))
}
