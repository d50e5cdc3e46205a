//! チェックスケジューラー
//!
//! 一定周期のディスパッチループが全エンドポイントの期限を評価し、
//! 期限到来したものを並行タスクとして実行する（グローバルなセマフォで同時数を制限）。
//! 状態マップはループタスクだけが所有し、完了はチャネル経由で同じタスクが反映する。

use super::executor::Probe;
use super::state::{CheckState, EndpointSchedule};
use crate::notify::Notifier;
use crate::registry::EndpointRegistry;
use crate::results::{AppendOutcome, ResultStore};
use crate::shutdown::ShutdownController;
use healthmon_common::config::MonitorConfig;
use healthmon_common::types::{NewCheckResult, TransportError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// ウォッチドッグがプローブのタイムアウトに上乗せする猶予
const WATCHDOG_GRACE: Duration = Duration::from_secs(5);

/// 保持期間パージの最短間隔
const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// スケジューラーの設定値
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// ディスパッチループの周期
    pub tick: Duration,
    /// 同時実行チェック数の上限
    pub max_concurrent_checks: usize,
    /// 履歴の最大保持期間
    pub max_age: Option<chrono::Duration>,
}

impl SchedulerSettings {
    /// 全体設定から作成
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            tick: Duration::from_millis(config.scheduler.tick_millis),
            max_concurrent_checks: config.scheduler.max_concurrent_checks,
            max_age: config
                .retention
                .max_age_days
                .map(|days| chrono::Duration::days(i64::from(days))),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

/// チェック完了の通知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// 対象エンドポイント
    pub endpoint_id: Uuid,
    /// ディスパッチ世代
    pub generation: u64,
    /// プローブ完了時刻
    pub completed_at: Instant,
}

/// 1回のtickの集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// ディスパッチしたチェック数
    pub dispatched: usize,
    /// 空きスロットが無く次回に回したチェック数
    pub deferred: usize,
    /// ウォッチドッグで打ち切ったチェック数
    pub expired: usize,
}

/// チェックスケジューラー
pub struct CheckScheduler {
    registry: EndpointRegistry,
    store: ResultStore,
    notifier: Notifier,
    probe: Arc<dyn Probe>,
    settings: SchedulerSettings,
    semaphore: Arc<Semaphore>,
    schedules: HashMap<Uuid, EndpointSchedule>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: Option<mpsc::UnboundedReceiver<Completion>>,
    wake: Arc<Notify>,
    next_generation: u64,
    last_purge: Option<Instant>,
}

impl CheckScheduler {
    /// スケジューラーを作成
    pub fn new(
        registry: EndpointRegistry,
        store: ResultStore,
        notifier: Notifier,
        probe: Arc<dyn Probe>,
        settings: SchedulerSettings,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            registry,
            store,
            notifier,
            probe,
            semaphore: Arc::new(Semaphore::new(settings.max_concurrent_checks)),
            settings,
            schedules: HashMap::new(),
            completion_tx,
            completion_rx: Some(completion_rx),
            wake: Arc::new(Notify::new()),
            next_generation: 0,
            last_purge: None,
        }
    }

    /// ループを起こすためのハンドル（APIハンドラーに渡す）
    pub fn trigger(&self) -> SchedulerTrigger {
        SchedulerTrigger {
            wake: self.wake.clone(),
        }
    }

    /// エンドポイントのスケジュール状態
    pub fn state_of(&self, endpoint_id: Uuid) -> Option<CheckState> {
        self.schedules.get(&endpoint_id).map(EndpointSchedule::state)
    }

    /// エンドポイントの次の期限（`None` は即時または未登録）
    pub fn next_due_at(&self, endpoint_id: Uuid) -> Option<Instant> {
        self.schedules
            .get(&endpoint_id)
            .and_then(EndpointSchedule::next_due_at)
    }

    /// 管理中のエンドポイント数
    pub fn tracked(&self) -> usize {
        self.schedules.len()
    }

    /// 実行中のチェック数
    pub fn in_flight(&self) -> usize {
        self.schedules.values().filter(|s| s.is_in_flight()).count()
    }

    /// 1回分の期限評価とディスパッチ
    ///
    /// レジストリから消えたエンドポイントは（実行中でなければ）状態ごと破棄する。
    pub async fn tick(&mut self, now: Instant) -> TickSummary {
        let endpoints = self.registry.snapshot().await;
        let present: HashSet<Uuid> = endpoints.iter().map(|e| e.id).collect();
        self.schedules
            .retain(|id, schedule| present.contains(id) || schedule.is_in_flight());

        let watchdog = self.probe.timeout() + WATCHDOG_GRACE;
        let mut summary = TickSummary::default();

        for endpoint in endpoints {
            let interval = Duration::from_secs(u64::from(endpoint.check_interval_seconds));
            let schedule = self
                .schedules
                .entry(endpoint.id)
                .or_insert_with(|| EndpointSchedule::new(interval, endpoint.active));
            schedule.sync(endpoint.active, interval);

            if schedule.expire(now) {
                summary.expired += 1;
                warn!(
                    endpoint_id = %endpoint.id,
                    watchdog_secs = watchdog.as_secs(),
                    "Check did not complete before watchdog deadline; returning to idle"
                );
            }

            if !schedule.evaluate(now) {
                continue;
            }

            let permit = match self.semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    summary.deferred += 1;
                    debug!(
                        endpoint_id = %endpoint.id,
                        "No free check slot; retrying next tick"
                    );
                    continue;
                }
            };

            self.next_generation += 1;
            let generation = self.next_generation;
            schedule.begin(generation, now + watchdog);
            summary.dispatched += 1;

            let probe = self.probe.clone();
            let store = self.store.clone();
            let notifier = self.notifier.clone();
            let completions = self.completion_tx.clone();
            let endpoint_id = endpoint.id;
            let url = endpoint.url;

            tokio::spawn(async move {
                let result = tokio::time::timeout(watchdog, probe.probe(endpoint_id, &url))
                    .await
                    .unwrap_or_else(|_| {
                        NewCheckResult::transport_failure(endpoint_id, TransportError::Timeout)
                    });
                let completed_at = Instant::now();

                let outcome = store.append(result).await;
                drop(permit);
                // 受信側が無い（ループ停止後）場合は無視
                let _ = completions.send(Completion {
                    endpoint_id,
                    generation,
                    completed_at,
                });

                match outcome {
                    Ok(AppendOutcome::Recorded { result, previous }) => {
                        notifier.observe(previous.as_ref(), &result).await;
                    }
                    Ok(AppendOutcome::Orphaned(_)) | Ok(AppendOutcome::Discarded) => {}
                    Err(e) => {
                        error!(
                            endpoint_id = %endpoint_id,
                            error = %e,
                            "Failed to record check result"
                        );
                    }
                }
            });
        }

        if summary.deferred > 0 {
            warn!(
                deferred = summary.deferred,
                limit = self.settings.max_concurrent_checks,
                "Check concurrency limit reached"
            );
        }
        summary
    }

    /// 完了を状態マップへ反映
    pub fn apply_completion(&mut self, completion: Completion) -> bool {
        match self.schedules.get_mut(&completion.endpoint_id) {
            Some(schedule) => {
                let applied = schedule.complete(completion.generation, completion.completed_at);
                if !applied {
                    debug!(
                        endpoint_id = %completion.endpoint_id,
                        generation = completion.generation,
                        "Ignoring stale completion"
                    );
                }
                applied
            }
            None => false,
        }
    }

    /// 次の完了を待って反映する（ループを使わずに駆動する場合用）
    pub async fn next_completion(&mut self) -> Option<Completion> {
        let completion = self.completion_rx.as_mut()?.recv().await?;
        self.apply_completion(completion);
        Some(completion)
    }

    /// 保持期間を過ぎた履歴を削除（1時間に1回まで）
    pub async fn purge_expired(&mut self, now: Instant) -> Option<u64> {
        let max_age = self.settings.max_age?;
        if let Some(last) = self.last_purge {
            if now.duration_since(last) < PURGE_INTERVAL {
                return None;
            }
        }
        self.last_purge = Some(now);

        let cutoff = chrono::Utc::now() - max_age;
        match self.store.purge_older_than(cutoff).await {
            Ok(removed) => Some(removed),
            Err(e) => {
                error!(error = %e, "Failed to purge expired check results");
                None
            }
        }
    }

    /// バックグラウンドでディスパッチループを開始
    pub fn spawn(mut self, shutdown: ShutdownController) -> SchedulerHandle {
        let trigger = self.trigger();
        let loop_wake = self.wake.clone();
        let loop_shutdown = shutdown.clone();

        let join = tokio::spawn(async move {
            let Some(mut completions) = self.completion_rx.take() else {
                error!("Scheduler completion channel already taken");
                return;
            };

            let mut ticker = tokio::time::interval(self.settings.tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                tick_millis = self.settings.tick.as_millis() as u64,
                max_concurrent_checks = self.settings.max_concurrent_checks,
                "Check scheduler started"
            );

            loop {
                tokio::select! {
                    _ = loop_shutdown.wait() => break,
                    Some(completion) = completions.recv() => {
                        self.apply_completion(completion);
                    }
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        self.tick(now).await;
                        self.purge_expired(now).await;
                    }
                    _ = loop_wake.notified() => {
                        self.tick(Instant::now()).await;
                    }
                }
            }

            info!(in_flight = self.in_flight(), "Check scheduler stopped");
        });

        SchedulerHandle {
            trigger,
            shutdown,
            join,
        }
    }
}

/// ディスパッチループを起こすハンドル
///
/// ループが動いていない場合（テストなど）は何もしない。
#[derive(Clone, Default)]
pub struct SchedulerTrigger {
    wake: Arc<Notify>,
}

impl SchedulerTrigger {
    /// 次のtickを待たずに期限評価を行わせる（作成・再アクティブ化の直後に使う）
    pub fn trigger(&self, endpoint_id: Uuid) {
        debug!(endpoint_id = %endpoint_id, "Scheduler wake requested");
        self.wake.notify_one();
    }
}

/// 実行中スケジューラーへのハンドル
pub struct SchedulerHandle {
    trigger: SchedulerTrigger,
    shutdown: ShutdownController,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// 次のtickを待たずに期限評価を行わせる
    pub fn trigger(&self, endpoint_id: Uuid) {
        self.trigger.trigger(endpoint_id);
    }

    /// 複製可能な起床ハンドル
    pub fn trigger_handle(&self) -> SchedulerTrigger {
        self.trigger.clone()
    }

    /// ループを停止して終了を待つ
    pub async fn shutdown(self) {
        self.shutdown.request_shutdown();
        if let Err(e) = self.join.await {
            error!(error = %e, "Scheduler task join error");
        }
    }
}
