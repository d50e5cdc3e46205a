//! Contract Test: POST /api/register, POST /api/login, 認証ミドルウェア

use crate::support::build_app;
use axum::http::{Method, StatusCode};
use healthmon_common::config::RetentionPolicy;
use serde_json::json;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn register_then_login_issues_usable_token() {
    let app = build_app(RetentionPolicy::Purge).await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/register",
            None,
            Some(json!({"email": "Alice@Example.com", "password": "password123"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["email"], "alice@example.com");
    assert!(body["data"]["id"].is_string());
    assert!(body["data"].get("password_hash").is_none());

    let (status, body) = app
        .call(
            Method::POST,
            "/api/login",
            None,
            Some(json!({"email": "alice@example.com", "password": "password123"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().expect("token").to_string();
    assert_eq!(body["email"], "alice@example.com");

    let (status, body) = app
        .call(Method::GET, "/api/endpoints", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
#[serial]
async fn register_rejects_invalid_input_with_field_errors() {
    let app = build_app(RetentionPolicy::Purge).await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/register",
            None,
            Some(json!({"email": "not-an-email", "password": "short"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["email"].is_array());
    assert!(body["errors"]["password"].is_array());
}

#[tokio::test]
#[serial]
async fn register_rejects_duplicate_email() {
    let app = build_app(RetentionPolicy::Purge).await;
    let payload = json!({"email": "dup@example.com", "password": "password123"});

    let (status, _) = app
        .call(Method::POST, "/api/register", None, Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .call(Method::POST, "/api/register", None, Some(payload))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["email"][0], "has already been taken");
}

#[tokio::test]
#[serial]
async fn login_with_wrong_password_is_401() {
    let app = build_app(RetentionPolicy::Purge).await;
    app.call(
        Method::POST,
        "/api/register",
        None,
        Some(json!({"email": "bob@example.com", "password": "password123"})),
    )
    .await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/login",
            None,
            Some(json!({"email": "bob@example.com", "password": "wrong-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = app
        .call(
            Method::POST,
            "/api/login",
            None,
            Some(json!({"email": "nobody@example.com", "password": "password123"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn protected_routes_require_bearer_token() {
    let app = build_app(RetentionPolicy::Purge).await;

    let (status, body) = app.call(Method::GET, "/api/endpoints", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = app
        .call(Method::GET, "/api/endpoints", Some("garbage"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(
            Method::GET,
            &format!("/api/check_results/{}", uuid::Uuid::new_v4()),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn health_route_is_public() {
    let app = build_app(RetentionPolicy::Purge).await;
    let (status, body) = app.call(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
