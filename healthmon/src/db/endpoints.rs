//! エンドポイントデータベース操作

use super::{from_db_timestamp, from_db_uuid, to_db_timestamp};
use healthmon_common::types::Endpoint;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

const SELECT_COLUMNS: &str = "SELECT id, owner_id, url, name, active, notification_email, \
     check_interval_seconds, created_at, updated_at FROM endpoints";

/// エンドポイントを登録
pub async fn create_endpoint(pool: &SqlitePool, endpoint: &Endpoint) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO endpoints (
            id, owner_id, url, name, active, notification_email,
            check_interval_seconds, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(endpoint.id.to_string())
    .bind(endpoint.owner_id.to_string())
    .bind(&endpoint.url)
    .bind(&endpoint.name)
    .bind(endpoint.active)
    .bind(&endpoint.notification_email)
    .bind(endpoint.check_interval_seconds as i64)
    .bind(to_db_timestamp(&endpoint.created_at))
    .bind(to_db_timestamp(&endpoint.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// エンドポイント一覧を取得（作成日時→ID順）
pub async fn list_endpoints(pool: &SqlitePool) -> Result<Vec<Endpoint>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EndpointRow>(&format!(
        "{} ORDER BY created_at ASC, id ASC",
        SELECT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Endpoint::try_from).collect()
}

/// IDでエンドポイントを取得
pub async fn get_endpoint(pool: &SqlitePool, id: Uuid) -> Result<Option<Endpoint>, sqlx::Error> {
    let row = sqlx::query_as::<_, EndpointRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(Endpoint::try_from).transpose()
}

/// エンドポイントを更新
pub async fn update_endpoint(pool: &SqlitePool, endpoint: &Endpoint) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE endpoints SET
            url = ?, name = ?, active = ?, notification_email = ?,
            check_interval_seconds = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&endpoint.url)
    .bind(&endpoint.name)
    .bind(endpoint.active)
    .bind(&endpoint.notification_email)
    .bind(endpoint.check_interval_seconds as i64)
    .bind(to_db_timestamp(&endpoint.updated_at))
    .bind(endpoint.id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// エンドポイントを削除
pub async fn delete_endpoint(pool: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM endpoints WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// エンドポイントを削除し、同じトランザクションで履歴も削除する
pub async fn delete_endpoint_with_history(
    pool: &SqlitePool,
    id: Uuid,
) -> Result<bool, sqlx::Error> {
    let mut tx: Transaction<'_, Sqlite> = pool.begin().await?;

    let deleted = sqlx::query("DELETE FROM endpoints WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected()
        > 0;

    if deleted {
        sqlx::query("DELETE FROM check_results WHERE endpoint_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(deleted)
}

#[derive(sqlx::FromRow)]
struct EndpointRow {
    id: String,
    owner_id: String,
    url: String,
    name: String,
    active: bool,
    notification_email: Option<String>,
    check_interval_seconds: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<EndpointRow> for Endpoint {
    type Error = sqlx::Error;

    fn try_from(row: EndpointRow) -> Result<Self, Self::Error> {
        Ok(Endpoint {
            id: from_db_uuid(&row.id)?,
            owner_id: from_db_uuid(&row.owner_id)?,
            url: row.url,
            name: row.name,
            active: row.active,
            notification_email: row.notification_email,
            check_interval_seconds: u32::try_from(row.check_interval_seconds)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            created_at: from_db_timestamp(&row.created_at)?,
            updated_at: from_db_timestamp(&row.updated_at)?,
        })
    }
}
