//! Contract Test: /api/endpoints

use crate::support::{build_app, TestApp};
use axum::http::{Method, StatusCode};
use healthmon_common::config::RetentionPolicy;
use serde_json::{json, Value};
use serial_test::serial;
use uuid::Uuid;

async fn create(app: &TestApp, token: &str, endpoint: Value) -> (StatusCode, Value) {
    app.call(
        Method::POST,
        "/api/endpoints",
        Some(token),
        Some(json!({ "endpoint": endpoint })),
    )
    .await
}

#[tokio::test]
#[serial]
async fn create_applies_defaults_and_returns_201() {
    let app = build_app(RetentionPolicy::Purge).await;
    let owner = Uuid::new_v4();
    let token = app.token_for(owner);

    let (status, body) = create(&app, &token, json!({"url": "https://example.com/health"})).await;
    assert_eq!(status, StatusCode::CREATED);

    let data = &body["data"];
    assert!(Uuid::parse_str(data["id"].as_str().unwrap()).is_ok());
    assert_eq!(data["url"], "https://example.com/health");
    assert_eq!(data["name"], "");
    assert_eq!(data["active"], true);
    assert_eq!(data["check_interval_seconds"], 60);
    assert_eq!(data["notification_email"], Value::Null);
    assert_eq!(data["owner_id"], owner.to_string());
    assert!(data["inserted_at"].is_string());
}

#[tokio::test]
#[serial]
async fn create_rejects_invalid_fields_with_422() {
    let app = build_app(RetentionPolicy::Purge).await;
    let token = app.token_for(Uuid::new_v4());

    let (status, body) = create(
        &app,
        &token,
        json!({
            "url": "ftp://example.com",
            "check_interval_seconds": 5,
            "notification_email": "nope"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["url"].is_array());
    assert!(body["errors"]["check_interval_seconds"].is_array());
    assert!(body["errors"]["notification_email"].is_array());

    // 何も保存されていない
    let (_, list) = app
        .call(Method::GET, "/api/endpoints", Some(&token), None)
        .await;
    assert_eq!(list["data"], json!([]));
}

#[tokio::test]
#[serial]
async fn malformed_json_is_422() {
    let app = build_app(RetentionPolicy::Purge).await;
    let token = app.token_for(Uuid::new_v4());

    let (status, body) = app
        .call(
            Method::POST,
            "/api/endpoints",
            Some(&token),
            Some(json!({"endpoint": {"check_interval_seconds": "often"}})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());
}

#[tokio::test]
#[serial]
async fn list_is_scoped_to_owner_and_filterable() {
    let app = build_app(RetentionPolicy::Purge).await;
    let alice = app.token_for(Uuid::new_v4());
    let bob = app.token_for(Uuid::new_v4());

    create(&app, &alice, json!({"url": "https://a.test", "name": "first"})).await;
    create(
        &app,
        &alice,
        json!({"url": "https://b.test", "name": "paused", "active": false}),
    )
    .await;
    create(&app, &bob, json!({"url": "https://c.test"})).await;

    let (status, body) = app
        .call(Method::GET, "/api/endpoints", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["first", "paused"]);

    let (_, body) = app
        .call(Method::GET, "/api/endpoints?active=true", Some(&alice), None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["name"], "first");
}

#[tokio::test]
#[serial]
async fn get_returns_404_for_unknown_or_foreign_endpoint() {
    let app = build_app(RetentionPolicy::Purge).await;
    let alice = app.token_for(Uuid::new_v4());
    let bob = app.token_for(Uuid::new_v4());

    let (_, body) = create(&app, &alice, json!({"url": "https://a.test"})).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .call(Method::GET, &format!("/api/endpoints/{}", id), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id);

    let (status, _) = app
        .call(Method::GET, &format!("/api/endpoints/{}", id), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .call(
            Method::GET,
            &format!("/api/endpoints/{}", Uuid::new_v4()),
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Endpoint not found");
}

#[tokio::test]
#[serial]
async fn put_changes_only_given_fields() {
    let app = build_app(RetentionPolicy::Purge).await;
    let token = app.token_for(Uuid::new_v4());

    let (_, body) = create(
        &app,
        &token,
        json!({
            "url": "https://a.test",
            "name": "api",
            "check_interval_seconds": 10,
            "notification_email": "ops@example.com"
        }),
    )
    .await;
    let original = body["data"].clone();
    let id = original["id"].as_str().unwrap().to_string();

    // フィールド直書き
    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/endpoints/{}", id),
            Some(&token),
            Some(json!({"check_interval_seconds": 30})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let updated = &body["data"];
    assert_eq!(updated["check_interval_seconds"], 30);
    assert_eq!(updated["name"], original["name"]);
    assert_eq!(updated["url"], original["url"]);
    assert_eq!(updated["notification_email"], "ops@example.com");
    assert_eq!(updated["inserted_at"], original["inserted_at"]);

    // エンベロープ形式で null を渡すと通知先をクリア
    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/endpoints/{}", id),
            Some(&token),
            Some(json!({"endpoint": {"notification_email": null}})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["notification_email"], Value::Null);
    assert_eq!(body["data"]["check_interval_seconds"], 30);
}

#[tokio::test]
#[serial]
async fn put_validates_and_404s() {
    let app = build_app(RetentionPolicy::Purge).await;
    let token = app.token_for(Uuid::new_v4());
    let (_, body) = create(&app, &token, json!({"url": "https://a.test"})).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/endpoints/{}", id),
            Some(&token),
            Some(json!({"check_interval_seconds": 9})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["check_interval_seconds"].is_array());

    // 失敗した更新は反映されない
    let (_, body) = app
        .call(Method::GET, &format!("/api/endpoints/{}", id), Some(&token), None)
        .await;
    assert_eq!(body["data"]["check_interval_seconds"], 60);

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/endpoints/{}", Uuid::new_v4()),
            Some(&token),
            Some(json!({"name": "x"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
async fn put_with_mistyped_wrapped_field_is_422() {
    let app = build_app(RetentionPolicy::Purge).await;
    let token = app.token_for(Uuid::new_v4());
    let (_, body) = create(&app, &token, json!({"url": "https://a.test"})).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    for endpoint in [
        json!({"check_interval_seconds": -5}),
        json!({"active": "no"}),
    ] {
        let (status, body) = app
            .call(
                Method::PUT,
                &format!("/api/endpoints/{}", id),
                Some(&token),
                Some(json!({ "endpoint": endpoint })),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"]["body"].is_array());
    }

    let (_, body) = app
        .call(Method::GET, &format!("/api/endpoints/{}", id), Some(&token), None)
        .await;
    assert_eq!(body["data"]["check_interval_seconds"], 60);
    assert_eq!(body["data"]["active"], true);
}

#[tokio::test]
#[serial]
async fn post_with_mistyped_wrapped_field_is_422_on_body() {
    let app = build_app(RetentionPolicy::Purge).await;
    let token = app.token_for(Uuid::new_v4());

    let (status, body) = create(
        &app,
        &token,
        json!({"url": "https://b.test", "check_interval_seconds": -1}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["body"].is_array());
    assert!(body["errors"]["url"].is_null());

    let (_, body) = app
        .call(Method::GET, "/api/endpoints", Some(&token), None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
#[serial]
async fn delete_returns_204_then_404() {
    let app = build_app(RetentionPolicy::Purge).await;
    let alice = app.token_for(Uuid::new_v4());
    let bob = app.token_for(Uuid::new_v4());
    let (_, body) = create(&app, &alice, json!({"url": "https://a.test"})).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/endpoints/{}", id);

    let (status, _) = app.call(Method::DELETE, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.call(Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = app.call(Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.call(Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
