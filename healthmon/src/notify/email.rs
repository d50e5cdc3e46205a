//! SMTP送信（lettre, tokio）

use super::{Notification, NotificationSender};
use crate::error::MonitorError;
use async_trait::async_trait;
use healthmon_common::config::SmtpConfig;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// SMTPによる通知送信
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpSender {
    /// SMTP設定から作成
    ///
    /// `tls = true` ならSTARTTLS、`false` なら平文接続（ローカルのリレー向け）。
    pub fn new(config: &SmtpConfig, from: &str) -> Result<Self, MonitorError> {
        let from: Mailbox = from.parse().map_err(|e| {
            MonitorError::Common(healthmon_common::error::CommonError::Config(format!(
                "Invalid notifier.from address '{}': {}",
                from, e
            )))
        })?;

        let mut builder = (if config.tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host).map_err(|e| {
                MonitorError::Notification(format!("Failed to configure SMTP relay: {}", e))
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        })
        .port(config.port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, notification: &Notification) -> Result<Message, MonitorError> {
        let to: Mailbox = notification.to.parse().map_err(|e| {
            MonitorError::Notification(format!("Invalid recipient '{}': {}", notification.to, e))
        })?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&notification.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone())
            .map_err(|e| MonitorError::Notification(format!("Failed to build message: {}", e)))
    }
}

#[async_trait]
impl NotificationSender for SmtpSender {
    async fn send(&self, notification: &Notification) -> Result<(), MonitorError> {
        let message = self.build_message(notification)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| MonitorError::Notification(format!("SMTP send failed: {}", e)))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
