//! Contract Test: GET /api/check_results/:endpoint_id

use crate::support::{build_app, TestApp};
use axum::http::{Method, StatusCode};
use healthmon_common::config::RetentionPolicy;
use healthmon_common::types::{NewCheckResult, NewEndpoint, TransportError};
use serde_json::Value;
use serial_test::serial;
use uuid::Uuid;

async fn endpoint_with_history(app: &TestApp, owner: Uuid, statuses: &[u16]) -> Uuid {
    let endpoint = app
        .state
        .registry
        .create(owner, NewEndpoint::with_url("https://a.test"))
        .await
        .unwrap();
    for (i, status) in statuses.iter().enumerate() {
        let mut result = NewCheckResult::response(endpoint.id, *status, 10 + i as u64);
        result.checked_at = chrono::Utc::now() + chrono::Duration::milliseconds(i as i64);
        app.state.results.append(result).await.unwrap();
    }
    endpoint.id
}

#[tokio::test]
#[serial]
async fn history_is_newest_first_and_limited() {
    let app = build_app(RetentionPolicy::Purge).await;
    let owner = Uuid::new_v4();
    let token = app.token_for(owner);
    let id = endpoint_with_history(&app, owner, &[200, 500, 404]).await;

    let (status, body) = app
        .call(
            Method::GET,
            &format!("/api/check_results/{}", id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let codes: Vec<u64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["status_code"].as_u64().unwrap())
        .collect();
    assert_eq!(codes, vec![404, 500, 200]);

    let (status, body) = app
        .call(
            Method::GET,
            &format!("/api/check_results/{}?limit=1", id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["status_code"], 404);
    assert_eq!(data[0]["endpoint_id"], id.to_string());
    assert!(data[0]["checked_at"].is_string());
}

#[tokio::test]
#[serial]
async fn transport_failure_has_no_response_time() {
    let app = build_app(RetentionPolicy::Purge).await;
    let owner = Uuid::new_v4();
    let token = app.token_for(owner);
    let id = endpoint_with_history(&app, owner, &[]).await;
    app.state
        .results
        .append(NewCheckResult::transport_failure(id, TransportError::Timeout))
        .await
        .unwrap();

    let (_, body) = app
        .call(
            Method::GET,
            &format!("/api/check_results/{}?limit=1", id),
            Some(&token),
            None,
        )
        .await;
    let result = &body["data"][0];
    assert_eq!(result["status_code"], 0);
    assert_eq!(result["response_time_ms"], Value::Null);
}

#[tokio::test]
#[serial]
async fn empty_history_is_an_empty_list() {
    let app = build_app(RetentionPolicy::Purge).await;
    let owner = Uuid::new_v4();
    let token = app.token_for(owner);
    let id = endpoint_with_history(&app, owner, &[]).await;

    let (status, body) = app
        .call(
            Method::GET,
            &format!("/api/check_results/{}", id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], serde_json::json!([]));
}

#[tokio::test]
#[serial]
async fn history_of_foreign_or_deleted_endpoint_is_404() {
    let app = build_app(RetentionPolicy::Retain).await;
    let owner = Uuid::new_v4();
    let token = app.token_for(owner);
    let other = app.token_for(Uuid::new_v4());
    let id = endpoint_with_history(&app, owner, &[200]).await;
    let uri = format!("/api/check_results/{}", id);

    let (status, _) = app.call(Method::GET, &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/endpoints/{}", id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // 保持ポリシーがretainなら履歴自体はDBに残る
    let kept: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM check_results WHERE endpoint_id = ?")
        .bind(id.to_string())
        .fetch_one(&app.state.db_pool)
        .await
        .unwrap();
    assert_eq!(kept, 1);
}

#[tokio::test]
#[serial]
async fn invalid_limit_is_rejected() {
    let app = build_app(RetentionPolicy::Purge).await;
    let owner = Uuid::new_v4();
    let token = app.token_for(owner);
    let id = endpoint_with_history(&app, owner, &[200]).await;

    let (status, _) = app
        .call(
            Method::GET,
            &format!("/api/check_results/{}?limit=-3", id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
