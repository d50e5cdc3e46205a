//! エンドポイント管理API
//!
//! すべての操作は呼び出しユーザーの所有するエンドポイントに限定される。
//! 他ユーザーのエンドポイントは存在しないものとして404を返す。

use super::error::AppError;
use super::owner_id;
use crate::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use healthmon_common::auth::Claims;
use healthmon_common::types::{Endpoint, EndpointPatch, NewEndpoint};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// `{"endpoint": {...}}` 形式とフィールド直書きの両方を受け付けるボディ
///
/// `endpoint` キーがあればその値だけを `T` として解釈する。
/// 中身の型エラーは直書き形式へフォールバックせず、そのまま422になる。
#[derive(Debug)]
pub struct EndpointBody<T>(pub T);

impl<T> EndpointBody<T> {
    fn into_inner(self) -> T {
        self.0
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for EndpointBody<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut value = Value::deserialize(deserializer)?;
        let inner = match value.as_object_mut().and_then(|o| o.remove("endpoint")) {
            Some(endpoint) => endpoint,
            None => value,
        };
        serde_json::from_value(inner)
            .map(EndpointBody)
            .map_err(de::Error::custom)
    }
}

/// レスポンスの `{"data": ...}` エンベロープ
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    /// ペイロード
    pub data: T,
}

/// 一覧のクエリ
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// `true` なら有効なエンドポイントのみ
    #[serde(default)]
    pub active: Option<bool>,
}

/// GET /api/endpoints - 自分のエンドポイント一覧
pub async fn list_endpoints(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<DataResponse<Vec<Endpoint>>>, AppError> {
    let Query(query) = query?;
    let owner = owner_id(&claims)?;
    let endpoints = state
        .registry
        .list_for_owner(owner, query.active.unwrap_or(false))
        .await;
    Ok(Json(DataResponse { data: endpoints }))
}

/// POST /api/endpoints - エンドポイント登録
///
/// # Returns
/// * `201 Created` - 登録されたエンドポイント
/// * `422 Unprocessable Entity` - バリデーションエラー
pub async fn create_endpoint(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    payload: Result<Json<EndpointBody<NewEndpoint>>, JsonRejection>,
) -> Result<(StatusCode, Json<DataResponse<Endpoint>>), AppError> {
    let Json(body) = payload?;
    let owner = owner_id(&claims)?;

    let endpoint = state.registry.create(owner, body.into_inner()).await?;
    if endpoint.active {
        state.scheduler.trigger(endpoint.id);
    }

    tracing::info!(
        endpoint_id = %endpoint.id,
        owner_id = %owner,
        interval_secs = endpoint.check_interval_seconds,
        "Endpoint registered"
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: endpoint })))
}

/// GET /api/endpoints/:id - エンドポイント取得
pub async fn get_endpoint(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DataResponse<Endpoint>>, AppError> {
    let owner = owner_id(&claims)?;
    let endpoint = state.registry.get_for_owner(id, owner).await?;
    Ok(Json(DataResponse { data: endpoint }))
}

/// PUT /api/endpoints/:id - 部分更新
///
/// 指定されたフィールドだけを変更する。`notification_email: null` で通知先をクリア。
pub async fn update_endpoint(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<EndpointBody<EndpointPatch>>, JsonRejection>,
) -> Result<Json<DataResponse<Endpoint>>, AppError> {
    let Json(body) = payload?;
    let owner = owner_id(&claims)?;
    let before = state.registry.get_for_owner(id, owner).await?;

    let patch = body.into_inner();
    if patch.is_empty() {
        return Ok(Json(DataResponse { data: before }));
    }

    let updated = state.registry.update(id, patch).await?;
    if updated.active && !before.active {
        state.scheduler.trigger(id);
    }

    tracing::info!(endpoint_id = %id, "Endpoint updated");
    Ok(Json(DataResponse { data: updated }))
}

/// DELETE /api/endpoints/:id - エンドポイント削除
///
/// 履歴は保持ポリシーに従って削除または保持される。
pub async fn delete_endpoint(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let owner = owner_id(&claims)?;
    state.registry.get_for_owner(id, owner).await?;
    state.results.delete_endpoint(id).await?;

    tracing::info!(
        endpoint_id = %id,
        retention = ?state.results.retention(),
        "Endpoint deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}
