//! チェック結果API

use super::endpoints::DataResponse;
use super::error::AppError;
use super::owner_id;
use crate::AppState;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Extension, Json,
};
use healthmon_common::auth::Claims;
use healthmon_common::types::CheckResult;
use serde::Deserialize;
use uuid::Uuid;

/// 履歴のクエリ
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// 最大件数（省略時は全件）
    #[serde(default)]
    pub limit: Option<u32>,
}

/// GET /api/check_results/:endpoint_id?limit=N - 新しい順の履歴
///
/// 削除済み・他ユーザーのエンドポイントは404。
pub async fn list_check_results(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(endpoint_id): Path<Uuid>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<DataResponse<Vec<CheckResult>>>, AppError> {
    let Query(query) = query?;
    let owner = owner_id(&claims)?;
    state.registry.get_for_owner(endpoint_id, owner).await?;

    let results = state.results.history(endpoint_id, query.limit).await?;
    Ok(Json(DataResponse { data: results }))
}
