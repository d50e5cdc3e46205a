//! ResultStore 実装

use crate::db::check_results as db;
use crate::error::MonitorError;
use crate::registry::EndpointRegistry;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use healthmon_common::config::RetentionPolicy;
use healthmon_common::types::{CheckResult, NewCheckResult};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// 履歴ストリームの既定ページサイズ
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// 追記の結果
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    /// 記録した（`previous` は直前の最新結果）
    Recorded {
        /// 記録した結果
        result: CheckResult,
        /// 直前の最新結果
        previous: Option<CheckResult>,
    },
    /// エンドポイント削除後に完了した結果を監査用に保持した
    Orphaned(CheckResult),
    /// エンドポイント削除後に完了した結果を破棄した
    Discarded,
}

/// 履歴ページングの再開位置
///
/// 直前に受け取った結果から `after` で生成すると、その続きから読み直せる。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryCursor {
    before: Option<(DateTime<Utc>, i64)>,
    page_size: u32,
}

impl HistoryCursor {
    /// 最新から読み始める
    pub fn start(page_size: u32) -> Self {
        Self {
            before: None,
            page_size: page_size.max(1),
        }
    }

    /// 指定結果より古いものから読み始める
    pub fn after(result: &CheckResult, page_size: u32) -> Self {
        Self {
            before: Some((result.checked_at, result.id)),
            page_size: page_size.max(1),
        }
    }

    /// ページサイズ
    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}

impl Default for HistoryCursor {
    fn default() -> Self {
        Self::start(DEFAULT_PAGE_SIZE)
    }
}

/// エンドポイントごとの最新結果キャッシュ
#[derive(Debug, Default)]
struct LatestCache {
    /// DBに残っている最新結果
    current: HashMap<Uuid, CheckResult>,
    /// 保持期間切れで削除された最新結果。次の追記の直前値として使う
    expired: HashMap<Uuid, CheckResult>,
}

impl LatestCache {
    fn forget(&mut self, endpoint_id: &Uuid) {
        self.current.remove(endpoint_id);
        self.expired.remove(endpoint_id);
    }
}

/// チェック結果ストア
///
/// 書き込み（追記・削除・パージ）は最新キャッシュの書き込みロックで直列化する。
/// 追記はロックを保持したままINSERTとキャッシュ更新を行うため、
/// `append` 完了後の `latest` は必ず追記した結果を返す。
#[derive(Clone)]
pub struct ResultStore {
    pool: SqlitePool,
    registry: EndpointRegistry,
    retention: RetentionPolicy,
    latest: Arc<RwLock<LatestCache>>,
}

impl ResultStore {
    /// ストアを作成
    pub fn new(pool: SqlitePool, registry: EndpointRegistry, retention: RetentionPolicy) -> Self {
        Self {
            pool,
            registry,
            retention,
            latest: Arc::new(RwLock::new(LatestCache::default())),
        }
    }

    /// 削除時の履歴ポリシー
    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// 結果を追記する
    ///
    /// エンドポイントが既に削除されている場合はポリシーに従い破棄するか
    /// `orphaned` として保持する。
    pub async fn append(&self, result: NewCheckResult) -> Result<AppendOutcome, MonitorError> {
        let endpoint_id = result.endpoint_id;
        let mut latest = self.latest.write().await;

        if !self.registry.contains(endpoint_id).await {
            return match self.retention {
                RetentionPolicy::Purge => {
                    debug!(endpoint_id = %endpoint_id, "Discarding result for deleted endpoint");
                    Ok(AppendOutcome::Discarded)
                }
                RetentionPolicy::Retain => {
                    let stored = db::insert_result(&self.pool, &result, true).await?;
                    debug!(endpoint_id = %endpoint_id, "Stored orphaned result");
                    Ok(AppendOutcome::Orphaned(stored))
                }
            };
        }

        let previous = match latest.current.get(&endpoint_id) {
            Some(cached) => Some(cached.clone()),
            None => match db::latest_result(&self.pool, endpoint_id).await? {
                Some(found) => Some(found),
                None => latest.expired.get(&endpoint_id).cloned(),
            },
        };
        let stored = db::insert_result(&self.pool, &result, false).await?;
        latest.expired.remove(&endpoint_id);
        // 最新は (checked_at, id) の最大値
        match &previous {
            Some(prev) if (prev.checked_at, prev.id) > (stored.checked_at, stored.id) => {
                latest.current.insert(endpoint_id, prev.clone());
            }
            _ => {
                latest.current.insert(endpoint_id, stored.clone());
            }
        }

        Ok(AppendOutcome::Recorded {
            result: stored,
            previous,
        })
    }

    /// 最新の結果
    pub async fn latest(&self, endpoint_id: Uuid) -> Result<Option<CheckResult>, MonitorError> {
        self.ensure_endpoint(endpoint_id).await?;
        let latest = self.latest.read().await;
        if let Some(cached) = latest.current.get(&endpoint_id) {
            return Ok(Some(cached.clone()));
        }
        Ok(db::latest_result(&self.pool, endpoint_id).await?)
    }

    /// 新しい順の履歴（`limit` 未指定なら全件）
    pub async fn history(
        &self,
        endpoint_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<CheckResult>, MonitorError> {
        self.ensure_endpoint(endpoint_id).await?;
        Ok(db::list_results(&self.pool, endpoint_id, limit).await?)
    }

    /// 指定時刻以降の履歴（古い順）
    pub async fn since(
        &self,
        endpoint_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<CheckResult>, MonitorError> {
        self.ensure_endpoint(endpoint_id).await?;
        Ok(db::list_results_since(&self.pool, endpoint_id, since).await?)
    }

    /// 履歴を新しい順に遅延読み込みするストリーム
    ///
    /// ページごとにキーセット検索を行い、接続は保持しない。
    /// 保持された削除済みエンドポイントの履歴も読める。
    pub fn history_stream(
        &self,
        endpoint_id: Uuid,
        cursor: HistoryCursor,
    ) -> BoxStream<'static, Result<CheckResult, MonitorError>> {
        let pool = self.pool.clone();
        stream::try_unfold(Some(cursor), move |state| {
            let pool = pool.clone();
            async move {
                let Some(cursor) = state else {
                    return Ok::<_, MonitorError>(None);
                };
                let page =
                    db::list_results_before(&pool, endpoint_id, cursor.before, cursor.page_size)
                        .await?;
                if page.is_empty() {
                    return Ok(None);
                }
                let next = if (page.len() as u32) < cursor.page_size {
                    None
                } else {
                    page.last()
                        .map(|last| HistoryCursor::after(last, cursor.page_size))
                };
                Ok(Some((page, next)))
            }
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, MonitorError>)))
        .try_flatten()
        .boxed()
    }

    /// エンドポイントを削除し、ポリシーに従って履歴を処理する
    ///
    /// 追記と同じロックの下で行うため、削除と並行して完了したチェック結果が
    /// ポリシーに反して残ることはない。
    pub async fn delete_endpoint(&self, endpoint_id: Uuid) -> Result<(), MonitorError> {
        let mut latest = self.latest.write().await;
        match self.retention {
            RetentionPolicy::Purge => self.registry.remove_with_history(endpoint_id).await?,
            RetentionPolicy::Retain => self.registry.remove(endpoint_id).await?,
        }
        latest.forget(&endpoint_id);
        Ok(())
    }

    /// エンドポイントの履歴をすべて削除
    pub async fn purge_endpoint(&self, endpoint_id: Uuid) -> Result<u64, MonitorError> {
        let mut latest = self.latest.write().await;
        let removed = db::delete_results_for_endpoint(&self.pool, endpoint_id).await?;
        latest.forget(&endpoint_id);
        debug!(endpoint_id = %endpoint_id, removed, "Purged endpoint history");
        Ok(removed)
    }

    /// 指定時刻より古い履歴を削除
    ///
    /// 最新結果まで削除されたエンドポイントは、その結果をメモリ上に残して
    /// 次の追記の直前値とする。`latest` と `history` からは見えなくなる。
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, MonitorError> {
        let mut latest = self.latest.write().await;
        let removed = db::delete_results_older_than(&self.pool, cutoff).await?;
        let expired: Vec<Uuid> = latest
            .current
            .iter()
            .filter(|(_, result)| result.checked_at < cutoff)
            .map(|(id, _)| *id)
            .collect();
        for endpoint_id in expired {
            if let Some(result) = latest.current.remove(&endpoint_id) {
                latest.expired.insert(endpoint_id, result);
            }
        }
        if removed > 0 {
            info!(removed, cutoff = %cutoff, "Purged expired check results");
        }
        Ok(removed)
    }

    async fn ensure_endpoint(&self, endpoint_id: Uuid) -> Result<(), MonitorError> {
        if self.registry.contains(endpoint_id).await {
            Ok(())
        } else {
            Err(MonitorError::EndpointNotFound(endpoint_id))
        }
    }
}
