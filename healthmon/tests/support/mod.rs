//! テスト共通ユーティリティ

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use healthmon::health::SchedulerTrigger;
use healthmon::registry::EndpointRegistry;
use healthmon::results::ResultStore;
use healthmon::shutdown::ShutdownController;
use healthmon::{api, AppState};
use healthmon_common::config::RetentionPolicy;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt;
use uuid::Uuid;

/// テスト用JWT秘密鍵
pub const TEST_JWT_SECRET: &str = "test-secret";

/// テスト用アプリケーション
#[allow(dead_code)]
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
}

#[allow(dead_code)]
impl TestApp {
    /// 指定ユーザーのトークンを発行する（ユーザーの存在は問わない）
    pub fn token_for(&self, user_id: Uuid) -> String {
        healthmon::auth::jwt::create_jwt(user_id, "user@example.com", TEST_JWT_SECRET, 1)
            .expect("create jwt")
    }

    /// JSONリクエストを送り、ステータスとJSONボディを返す
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

/// テスト用のSQLiteデータベースプールを作成する
#[allow(dead_code)]
pub async fn create_test_db_pool() -> SqlitePool {
    healthmon::db::migrations::initialize_database("sqlite::memory:")
        .await
        .expect("Failed to create test database")
}

/// テスト用のアプリケーションを作成する（スケジューラーは起動しない）
#[allow(dead_code)]
pub async fn build_app(retention: RetentionPolicy) -> TestApp {
    let db_pool = create_test_db_pool().await;
    let registry = EndpointRegistry::new(db_pool.clone())
        .await
        .expect("Failed to create endpoint registry");
    let results = ResultStore::new(db_pool.clone(), registry.clone(), retention);

    let state = AppState {
        registry,
        results,
        scheduler: SchedulerTrigger::default(),
        db_pool,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        token_ttl_hours: 1,
        shutdown: ShutdownController::default(),
    };

    TestApp {
        app: api::create_app(state.clone()),
        state,
    }
}
