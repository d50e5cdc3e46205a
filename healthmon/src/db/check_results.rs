//! チェック結果データベース操作
//!
//! 1件の結果は単一のINSERTで書き込む。エンドポイント単位の並びは
//! (`checked_at`, `id`) の全順序で、最新はその最大値。

use super::{from_db_timestamp, from_db_uuid, to_db_timestamp};
use chrono::{DateTime, Utc};
use healthmon_common::types::{CheckResult, NewCheckResult};
use sqlx::SqlitePool;
use uuid::Uuid;

const SELECT_COLUMNS: &str = "SELECT id, endpoint_id, status_code, response_time_ms, \
     checked_at, error, orphaned FROM check_results";

/// チェック結果を挿入し、採番済みの結果を返す
pub async fn insert_result(
    pool: &SqlitePool,
    result: &NewCheckResult,
    orphaned: bool,
) -> Result<CheckResult, sqlx::Error> {
    let response_time_ms = result
        .response_time_ms
        .map(i64::try_from)
        .transpose()
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    let id = sqlx::query(
        r#"
        INSERT INTO check_results (
            endpoint_id, status_code, response_time_ms, checked_at, error, orphaned
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(result.endpoint_id.to_string())
    .bind(result.status_code as i64)
    .bind(response_time_ms)
    .bind(to_db_timestamp(&result.checked_at))
    .bind(&result.error)
    .bind(orphaned)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(CheckResult {
        id,
        endpoint_id: result.endpoint_id,
        status_code: result.status_code,
        response_time_ms: result.response_time_ms,
        checked_at: from_db_timestamp(&to_db_timestamp(&result.checked_at))?,
        error: result.error.clone(),
        orphaned,
    })
}

/// 最新の結果を取得
pub async fn latest_result(
    pool: &SqlitePool,
    endpoint_id: Uuid,
) -> Result<Option<CheckResult>, sqlx::Error> {
    let row = sqlx::query_as::<_, CheckResultRow>(&format!(
        "{} WHERE endpoint_id = ? ORDER BY checked_at DESC, id DESC LIMIT 1",
        SELECT_COLUMNS
    ))
    .bind(endpoint_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(CheckResult::try_from).transpose()
}

/// 新しい順に結果を取得（`limit` 未指定なら全件）
pub async fn list_results(
    pool: &SqlitePool,
    endpoint_id: Uuid,
    limit: Option<u32>,
) -> Result<Vec<CheckResult>, sqlx::Error> {
    // SQLiteの LIMIT -1 は無制限
    let limit = limit.map(i64::from).unwrap_or(-1);
    let rows = sqlx::query_as::<_, CheckResultRow>(&format!(
        "{} WHERE endpoint_id = ? ORDER BY checked_at DESC, id DESC LIMIT ?",
        SELECT_COLUMNS
    ))
    .bind(endpoint_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(CheckResult::try_from).collect()
}

/// キーセットページング: `before` より古い結果を新しい順に `limit` 件取得
pub async fn list_results_before(
    pool: &SqlitePool,
    endpoint_id: Uuid,
    before: Option<(DateTime<Utc>, i64)>,
    limit: u32,
) -> Result<Vec<CheckResult>, sqlx::Error> {
    let rows = match before {
        Some((checked_at, id)) => {
            let ts = to_db_timestamp(&checked_at);
            sqlx::query_as::<_, CheckResultRow>(&format!(
                "{} WHERE endpoint_id = ? AND (checked_at < ? OR (checked_at = ? AND id < ?)) \
                 ORDER BY checked_at DESC, id DESC LIMIT ?",
                SELECT_COLUMNS
            ))
            .bind(endpoint_id.to_string())
            .bind(&ts)
            .bind(&ts)
            .bind(id)
            .bind(i64::from(limit))
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, CheckResultRow>(&format!(
                "{} WHERE endpoint_id = ? ORDER BY checked_at DESC, id DESC LIMIT ?",
                SELECT_COLUMNS
            ))
            .bind(endpoint_id.to_string())
            .bind(i64::from(limit))
            .fetch_all(pool)
            .await?
        }
    };

    rows.into_iter().map(CheckResult::try_from).collect()
}

/// 指定時刻以降の結果を古い順に取得
pub async fn list_results_since(
    pool: &SqlitePool,
    endpoint_id: Uuid,
    since: DateTime<Utc>,
) -> Result<Vec<CheckResult>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CheckResultRow>(&format!(
        "{} WHERE endpoint_id = ? AND checked_at >= ? ORDER BY checked_at ASC, id ASC",
        SELECT_COLUMNS
    ))
    .bind(endpoint_id.to_string())
    .bind(to_db_timestamp(&since))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(CheckResult::try_from).collect()
}

/// エンドポイントの結果をすべて削除
pub async fn delete_results_for_endpoint(
    pool: &SqlitePool,
    endpoint_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM check_results WHERE endpoint_id = ?")
        .bind(endpoint_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// 指定時刻より古い結果を削除
pub async fn delete_results_older_than(
    pool: &SqlitePool,
    cutoff: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM check_results WHERE checked_at < ?")
        .bind(to_db_timestamp(&cutoff))
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[derive(sqlx::FromRow)]
struct CheckResultRow {
    id: i64,
    endpoint_id: String,
    status_code: i64,
    response_time_ms: Option<i64>,
    checked_at: String,
    error: Option<String>,
    orphaned: bool,
}

impl TryFrom<CheckResultRow> for CheckResult {
    type Error = sqlx::Error;

    fn try_from(row: CheckResultRow) -> Result<Self, Self::Error> {
        let decode = |e: std::num::TryFromIntError| sqlx::Error::Decode(Box::new(e));
        Ok(CheckResult {
            id: row.id,
            endpoint_id: from_db_uuid(&row.endpoint_id)?,
            status_code: u16::try_from(row.status_code).map_err(decode)?,
            response_time_ms: row
                .response_time_ms
                .map(u64::try_from)
                .transpose()
                .map_err(decode)?,
            checked_at: from_db_timestamp(&row.checked_at)?,
            error: row.error,
            orphaned: row.orphaned,
        })
    }
}
