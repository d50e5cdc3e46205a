//! E2E: スケジューラー → HTTPプローブ → 結果ストア → 通知

use crate::support::create_test_db_pool;
use async_trait::async_trait;
use healthmon::error::MonitorError;
use healthmon::health::{CheckScheduler, HttpProbe, Probe, SchedulerSettings};
use healthmon::notify::{Notification, NotificationSender, Notifier};
use healthmon::registry::EndpointRegistry;
use healthmon::results::ResultStore;
use healthmon::shutdown::ShutdownController;
use healthmon_common::config::{ProbeMethod, RetentionPolicy};
use healthmon_common::types::{NewEndpoint, TRANSPORT_FAILURE_STATUS};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 送信内容を記録する送信手段
#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, notification: &Notification) -> Result<(), MonitorError> {
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

struct Harness {
    registry: EndpointRegistry,
    store: ResultStore,
    sender: Arc<RecordingSender>,
    scheduler: CheckScheduler,
}

async fn harness(probe: Arc<dyn Probe>, retention: RetentionPolicy) -> Harness {
    let pool = create_test_db_pool().await;
    let registry = EndpointRegistry::new(pool.clone()).await.unwrap();
    let store = ResultStore::new(pool, registry.clone(), retention);
    let sender = Arc::new(RecordingSender::default());
    let notifier = Notifier::new(registry.clone(), sender.clone(), false);
    let scheduler = CheckScheduler::new(
        registry.clone(),
        store.clone(),
        notifier,
        probe,
        SchedulerSettings {
            tick: Duration::from_millis(50),
            max_concurrent_checks: 4,
            max_age: None,
        },
    );
    Harness {
        registry,
        store,
        sender,
        scheduler,
    }
}

async fn respond_with(server: &MockServer, status: u16) {
    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

async fn wait_for_notifications(sender: &RecordingSender, expected: usize) -> Vec<Notification> {
    for _ in 0..100 {
        {
            let sent = sender.sent.lock().await;
            if sent.len() >= expected {
                return sent.clone();
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    sender.sent.lock().await.clone()
}

#[tokio::test]
#[serial]
async fn running_scheduler_records_first_check_immediately() {
    let server = MockServer::start().await;
    respond_with(&server, 200).await;

    let probe = Arc::new(HttpProbe::with_timeout(ProbeMethod::Get, Duration::from_secs(5)).unwrap());
    let h = harness(probe, RetentionPolicy::Purge).await;
    let endpoint = h
        .registry
        .create(Uuid::new_v4(), NewEndpoint::with_url(&server.uri()))
        .await
        .unwrap();

    let handle = h.scheduler.spawn(ShutdownController::default());
    handle.trigger(endpoint.id);

    let mut latest = None;
    for _ in 0..100 {
        latest = h.store.latest(endpoint.id).await.unwrap();
        if latest.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    handle.shutdown().await;

    let latest = latest.expect("first check should run right after creation");
    assert_eq!(latest.status_code, 200);
    assert!(latest.response_time_ms.is_some());
    // 間隔(60秒)内なので1件だけ
    assert_eq!(h.store.history(endpoint.id, None).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn health_transitions_notify_exactly_twice() {
    let server = MockServer::start().await;
    let probe = Arc::new(HttpProbe::with_timeout(ProbeMethod::Get, Duration::from_secs(5)).unwrap());
    let mut h = harness(probe, RetentionPolicy::Purge).await;
    let endpoint = h
        .registry
        .create(
            Uuid::new_v4(),
            NewEndpoint {
                name: "api".to_string(),
                notification_email: Some("ops@example.com".to_string()),
                check_interval_seconds: 10,
                ..NewEndpoint::with_url(&server.uri())
            },
        )
        .await
        .unwrap();

    let mut now = Instant::now();
    for status in [200, 200, 500, 500, 200] {
        respond_with(&server, status).await;
        let summary = h.scheduler.tick(now).await;
        assert_eq!(summary.dispatched, 1, "status {} was not dispatched", status);
        let completion = h.scheduler.next_completion().await.unwrap();
        now = completion.completed_at + Duration::from_secs(10);
    }

    let sent = wait_for_notifications(&h.sender, 2).await;
    // 配送タスクが遅れて追加で届かないことを確認する
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.sender.sent.lock().await.len(), 2);

    assert_eq!(sent[0].to, "ops@example.com");
    assert_eq!(sent[0].subject, "[healthmon] api is DOWN");
    assert_eq!(sent[1].subject, "[healthmon] api has recovered");

    let history = h.store.history(endpoint.id, None).await.unwrap();
    let codes: Vec<u16> = history.iter().map(|r| r.status_code).collect();
    assert_eq!(codes, vec![200, 500, 500, 200, 200]);
}

#[tokio::test]
#[serial]
async fn probe_timeout_records_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let probe =
        Arc::new(HttpProbe::with_timeout(ProbeMethod::Get, Duration::from_millis(300)).unwrap());
    let mut h = harness(probe, RetentionPolicy::Purge).await;
    let endpoint = h
        .registry
        .create(Uuid::new_v4(), NewEndpoint::with_url(&server.uri()))
        .await
        .unwrap();

    h.scheduler.tick(Instant::now()).await;
    h.scheduler.next_completion().await.unwrap();

    let history = h.store.history(endpoint.id, None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status_code, TRANSPORT_FAILURE_STATUS);
    assert_eq!(history[0].response_time_ms, None);
    // 最初の結果は遷移ではない
    assert!(wait_for_notifications(&h.sender, 1).await.is_empty());
}

#[tokio::test]
#[serial]
async fn delete_during_check_keeps_orphan_when_retaining() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let probe = Arc::new(HttpProbe::with_timeout(ProbeMethod::Get, Duration::from_secs(5)).unwrap());
    let mut h = harness(probe, RetentionPolicy::Retain).await;
    let endpoint = h
        .registry
        .create(Uuid::new_v4(), NewEndpoint::with_url(&server.uri()))
        .await
        .unwrap();

    h.scheduler.tick(Instant::now()).await;
    h.store.delete_endpoint(endpoint.id).await.unwrap();
    h.scheduler.next_completion().await.unwrap();

    let orphaned: Vec<i64> =
        sqlx::query_scalar("SELECT orphaned FROM check_results WHERE endpoint_id = ?")
            .bind(endpoint.id.to_string())
            .fetch_all(h.registry.pool())
            .await
            .unwrap();
    assert_eq!(orphaned, vec![1]);

    // 次のtickでスケジュールからも消える
    assert_eq!(h.scheduler.tick(Instant::now()).await.dispatched, 0);
    assert_eq!(h.scheduler.tracked(), 0);
}
