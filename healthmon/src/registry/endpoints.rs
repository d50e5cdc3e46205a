//! エンドポイントレジストリ
//!
//! エンドポイントの設定をメモリ内で管理し、SQLiteと同期

use super::validation::{validate_endpoint, validate_new};
use crate::db::endpoints as db;
use crate::error::MonitorError;
use healthmon_common::types::{Endpoint, EndpointPatch, NewEndpoint};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// エンドポイントレジストリ
///
/// エンドポイント情報をメモリにキャッシュし、高速な参照を提供する。
/// 変更はDBへ書いてからキャッシュへ反映する。書き込み中はキャッシュの
/// 書き込みロックを保持するため、読み手は更新前か更新後のどちらかだけを観測する。
#[derive(Clone)]
pub struct EndpointRegistry {
    /// エンドポイントのインメモリキャッシュ
    endpoints: Arc<RwLock<HashMap<Uuid, Endpoint>>>,
    /// データベースプール
    pool: SqlitePool,
}

impl EndpointRegistry {
    /// SQLiteプールからレジストリを作成し、DBからデータを読み込む
    pub async fn new(pool: SqlitePool) -> Result<Self, MonitorError> {
        let registry = Self {
            endpoints: Arc::new(RwLock::new(HashMap::new())),
            pool,
        };
        registry.reload().await?;
        Ok(registry)
    }

    /// DBからキャッシュを再構築
    pub async fn reload(&self) -> Result<(), MonitorError> {
        let loaded = db::list_endpoints(&self.pool).await?;
        let mut endpoints = self.endpoints.write().await;
        endpoints.clear();
        for endpoint in loaded {
            endpoints.insert(endpoint.id, endpoint);
        }
        info!(endpoint_count = endpoints.len(), "Loaded endpoints from database");
        Ok(())
    }

    /// エンドポイントを作成
    pub async fn create(
        &self,
        owner_id: Uuid,
        config: NewEndpoint,
    ) -> Result<Endpoint, MonitorError> {
        validate_new(&config).into_result()?;
        let endpoint = Endpoint::new(owner_id, config);

        let mut endpoints = self.endpoints.write().await;
        db::create_endpoint(&self.pool, &endpoint).await?;
        endpoints.insert(endpoint.id, endpoint.clone());

        info!(
            endpoint_id = %endpoint.id,
            url = %endpoint.url,
            interval_secs = endpoint.check_interval_seconds,
            "Endpoint created"
        );
        Ok(endpoint)
    }

    /// エンドポイントを取得
    pub async fn get(&self, id: Uuid) -> Result<Endpoint, MonitorError> {
        self.find(id)
            .await
            .ok_or(MonitorError::EndpointNotFound(id))
    }

    /// エンドポイントを取得（存在しなければNone）
    pub async fn find(&self, id: Uuid) -> Option<Endpoint> {
        self.endpoints.read().await.get(&id).cloned()
    }

    /// 指定ユーザーが所有するエンドポイントを取得
    ///
    /// 他ユーザーのエンドポイントは存在しないものとして扱う。
    pub async fn get_for_owner(&self, id: Uuid, owner_id: Uuid) -> Result<Endpoint, MonitorError> {
        match self.find(id).await {
            Some(endpoint) if endpoint.owner_id == owner_id => Ok(endpoint),
            _ => Err(MonitorError::EndpointNotFound(id)),
        }
    }

    /// エンドポイントが存在するか
    pub async fn contains(&self, id: Uuid) -> bool {
        self.endpoints.read().await.contains_key(&id)
    }

    /// エンドポイント一覧（作成日時→ID順）
    pub async fn list(&self, active_only: bool) -> Vec<Endpoint> {
        self.list_filtered(|e| !active_only || e.active).await
    }

    /// 指定ユーザーのエンドポイント一覧（作成日時→ID順）
    pub async fn list_for_owner(&self, owner_id: Uuid, active_only: bool) -> Vec<Endpoint> {
        self.list_filtered(|e| e.owner_id == owner_id && (!active_only || e.active))
            .await
    }

    /// スケジューラー用の一貫したスナップショット
    ///
    /// 非アクティブなものも含める（停止への遷移をスケジューラーが観測するため）。
    pub async fn snapshot(&self) -> Vec<Endpoint> {
        self.list(false).await
    }

    async fn list_filtered<F>(&self, filter: F) -> Vec<Endpoint>
    where
        F: Fn(&Endpoint) -> bool,
    {
        let mut list: Vec<Endpoint> = self
            .endpoints
            .read()
            .await
            .values()
            .filter(|e| filter(e))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        list
    }

    /// エンドポイントを部分更新
    pub async fn update(&self, id: Uuid, patch: EndpointPatch) -> Result<Endpoint, MonitorError> {
        let mut endpoints = self.endpoints.write().await;
        let mut endpoint = endpoints
            .get(&id)
            .cloned()
            .ok_or(MonitorError::EndpointNotFound(id))?;

        endpoint.apply(patch);
        validate_endpoint(&endpoint).into_result()?;

        if !db::update_endpoint(&self.pool, &endpoint).await? {
            endpoints.remove(&id);
            return Err(MonitorError::EndpointNotFound(id));
        }
        endpoints.insert(id, endpoint.clone());

        debug!(
            endpoint_id = %id,
            active = endpoint.active,
            interval_secs = endpoint.check_interval_seconds,
            "Endpoint updated"
        );
        Ok(endpoint)
    }

    /// エンドポイントを削除（履歴は残す）
    pub async fn remove(&self, id: Uuid) -> Result<(), MonitorError> {
        let mut endpoints = self.endpoints.write().await;
        let deleted = db::delete_endpoint(&self.pool, id).await?;
        endpoints.remove(&id);
        if !deleted {
            return Err(MonitorError::EndpointNotFound(id));
        }
        info!(endpoint_id = %id, "Endpoint deleted");
        Ok(())
    }

    /// エンドポイントと履歴を同一トランザクションで削除
    pub async fn remove_with_history(&self, id: Uuid) -> Result<(), MonitorError> {
        let mut endpoints = self.endpoints.write().await;
        let deleted = db::delete_endpoint_with_history(&self.pool, id).await?;
        endpoints.remove(&id);
        if !deleted {
            return Err(MonitorError::EndpointNotFound(id));
        }
        info!(endpoint_id = %id, "Endpoint and check history deleted");
        Ok(())
    }

    /// 登録数
    pub async fn count(&self) -> usize {
        self.endpoints.read().await.len()
    }

    /// データベースプール
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
