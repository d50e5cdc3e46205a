//! チェック実行（HTTPプローブ）
//!
//! 1回のHTTPリクエストで応答時間を計測し、結果を1件だけ生成する。
//! プローブはエラーを返さない。トランスポート失敗もステータス0の結果として表す。

use crate::error::MonitorError;
use async_trait::async_trait;
use healthmon_common::config::{ProbeConfig, ProbeMethod};
use healthmon_common::types::{NewCheckResult, TransportError};
use reqwest::{redirect, Client, Method};
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// プローブのUser-Agent
pub const USER_AGENT: &str = concat!("healthmon/", env!("CARGO_PKG_VERSION"));

/// チェック実行のインターフェース
#[async_trait]
pub trait Probe: Send + Sync {
    /// URLを1回プローブして結果を返す
    async fn probe(&self, endpoint_id: Uuid, url: &str) -> NewCheckResult;

    /// 1回のプローブの上限時間
    fn timeout(&self) -> Duration;
}

/// reqwestによるHTTPプローブ
#[derive(Clone)]
pub struct HttpProbe {
    client: Client,
    method: Method,
    timeout: Duration,
}

impl HttpProbe {
    /// 設定からプローブを作成
    pub fn new(config: &ProbeConfig) -> Result<Self, MonitorError> {
        Self::with_timeout(config.method, Duration::from_secs(config.timeout_secs))
    }

    /// メソッドとタイムアウトを指定して作成
    ///
    /// リダイレクトは追跡しない（3xxはそのまま分類する）。
    pub fn with_timeout(method: ProbeMethod, timeout: Duration) -> Result<Self, MonitorError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MonitorError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let method = match method {
            ProbeMethod::Get => Method::GET,
            ProbeMethod::Head => Method::HEAD,
        };

        Ok(Self {
            client,
            method,
            timeout,
        })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, endpoint_id: Uuid, url: &str) -> NewCheckResult {
        let started = Instant::now();
        let response = self.client.request(self.method.clone(), url).send().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match response {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!(
                    endpoint_id = %endpoint_id,
                    status,
                    elapsed_ms,
                    "Probe completed"
                );
                NewCheckResult::response(endpoint_id, status, elapsed_ms)
            }
            Err(e) => {
                let kind = classify_error(&e);
                debug!(
                    endpoint_id = %endpoint_id,
                    error = %e,
                    kind = %kind,
                    "Probe failed"
                );
                NewCheckResult::transport_failure(endpoint_id, kind)
            }
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn classify_error(error: &reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect
    } else {
        TransportError::Request
    }
}
