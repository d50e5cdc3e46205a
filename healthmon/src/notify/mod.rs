//! 状態遷移の通知
//!
//! 最新結果の健全性（healthy / unhealthy）が直前の結果と異なるとき、
//! エンドポイントの通知先へ1件だけ通知する。エンドポイントの最初の結果は遷移ではない。
//! 送信失敗はログに残すだけで呼び出し側へは伝えない。

/// SMTP送信
pub mod email;

pub use email::SmtpSender;

use crate::error::MonitorError;
use crate::registry::EndpointRegistry;
use async_trait::async_trait;
use healthmon_common::config::NotifierConfig;
use healthmon_common::types::{CheckResult, Endpoint, Health, StatusClass};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 送信するメッセージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// 宛先
    pub to: String,
    /// 件名
    pub subject: String,
    /// 本文
    pub body: String,
}

/// 通知の送信手段
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// メッセージを送信する
    async fn send(&self, notification: &Notification) -> Result<(), MonitorError>;

    /// 送信手段の名前（`"smtp"`, `"log"`）
    fn name(&self) -> &'static str;
}

/// ログ出力のみの送信手段（SMTP未設定時）
#[derive(Debug, Clone, Default)]
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, notification: &Notification) -> Result<(), MonitorError> {
        info!(
            to = %notification.to,
            subject = %notification.subject,
            "Notification (SMTP not configured)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// 健全性の遷移
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// 対象エンドポイント
    pub endpoint_id: Uuid,
    /// 遷移前
    pub from: Health,
    /// 遷移後
    pub to: Health,
    /// 遷移を引き起こした結果
    pub result: CheckResult,
}

/// 直前の結果と比較して遷移を検出する
pub fn detect_transition(
    previous: Option<&CheckResult>,
    current: &CheckResult,
    redirect_is_failure: bool,
) -> Option<Transition> {
    let from = previous?.health(redirect_is_failure);
    let to = current.health(redirect_is_failure);
    (from != to).then(|| Transition {
        endpoint_id: current.endpoint_id,
        from,
        to,
        result: current.clone(),
    })
}

/// 遷移通知の件名と本文を組み立てる
pub fn compose(endpoint: &Endpoint, transition: &Transition, to: &str) -> Notification {
    let result = &transition.result;
    let subject = match transition.to {
        Health::Unhealthy => format!("[healthmon] {} is DOWN", endpoint.label()),
        Health::Healthy => format!("[healthmon] {} has recovered", endpoint.label()),
    };

    let status_line = match result.status_class() {
        StatusClass::TransportFailure => format!(
            "Status: no response ({})",
            result.error.as_deref().unwrap_or("transport failure")
        ),
        _ => format!("Status: HTTP {}", result.status_code),
    };
    let latency_line = result
        .response_time_ms
        .map(|ms| format!("\nResponse time: {} ms", ms))
        .unwrap_or_default();

    let body = format!(
        "Endpoint: {label}\nURL: {url}\nState: {from} -> {to}\n{status}{latency}\nChecked at: {checked_at}",
        label = endpoint.label(),
        url = endpoint.url,
        from = transition.from,
        to = transition.to,
        status = status_line,
        latency = latency_line,
        checked_at = result.checked_at.to_rfc3339(),
    );

    Notification {
        to: to.to_string(),
        subject,
        body,
    }
}

/// 遷移検出と通知配送
#[derive(Clone)]
pub struct Notifier {
    registry: EndpointRegistry,
    sender: Arc<dyn NotificationSender>,
    redirect_is_failure: bool,
}

impl Notifier {
    /// 送信手段を指定して作成
    pub fn new(
        registry: EndpointRegistry,
        sender: Arc<dyn NotificationSender>,
        redirect_is_failure: bool,
    ) -> Self {
        Self {
            registry,
            sender,
            redirect_is_failure,
        }
    }

    /// 設定から送信手段を選んで作成（SMTP設定があればSMTP、なければログ）
    pub fn from_config(
        registry: EndpointRegistry,
        config: &NotifierConfig,
        redirect_is_failure: bool,
    ) -> Result<Self, MonitorError> {
        let sender: Arc<dyn NotificationSender> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpSender::new(smtp, &config.from)?),
            None => Arc::new(LogSender),
        };
        info!(sender = sender.name(), "Notifier initialized");
        Ok(Self::new(registry, sender, redirect_is_failure))
    }

    /// 新しい結果を観測し、遷移があれば配送を別タスクで開始する
    ///
    /// 通知先の無いエンドポイントも遷移は返す（配送だけ行わない）。
    pub async fn observe(
        &self,
        previous: Option<&CheckResult>,
        current: &CheckResult,
    ) -> Option<Transition> {
        let transition = detect_transition(previous, current, self.redirect_is_failure)?;

        info!(
            endpoint_id = %transition.endpoint_id,
            from = %transition.from,
            to = %transition.to,
            status_code = current.status_code,
            "Endpoint health changed"
        );

        let endpoint = self.registry.find(transition.endpoint_id).await;
        match endpoint {
            Some(endpoint) => match endpoint.notification_email.clone() {
                Some(to) => {
                    let notification = compose(&endpoint, &transition, &to);
                    let notifier = self.clone();
                    tokio::spawn(async move {
                        notifier.deliver(&notification).await;
                    });
                }
                None => {
                    debug!(
                        endpoint_id = %transition.endpoint_id,
                        "No notification address configured"
                    );
                }
            },
            None => {
                debug!(
                    endpoint_id = %transition.endpoint_id,
                    "Endpoint removed before notification"
                );
            }
        }

        Some(transition)
    }

    /// 通知を配送する（失敗はログのみ）
    pub async fn deliver(&self, notification: &Notification) -> bool {
        match self.sender.send(notification).await {
            Ok(()) => {
                debug!(
                    to = %notification.to,
                    sender = self.sender.name(),
                    "Notification delivered"
                );
                true
            }
            Err(e) => {
                warn!(
                    to = %notification.to,
                    sender = self.sender.name(),
                    error = %e,
                    "Notification delivery failed"
                );
                false
            }
        }
    }
}
