//! serve サブコマンド
//!
//! 設定を読み込み、データベース・レジストリ・スケジューラー・APIサーバーを起動する。

use crate::error::MonitorError;
use crate::health::{CheckScheduler, HttpProbe, SchedulerSettings};
use crate::notify::Notifier;
use crate::registry::EndpointRegistry;
use crate::results::ResultStore;
use crate::shutdown::ShutdownController;
use crate::AppState;
use clap::Args;
use healthmon_common::config::MonitorConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// serve サブコマンドの引数
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Path to a TOML config file
    #[arg(short, long, env = "HEALTHMON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bind address (overrides server.host)
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Listen port (overrides server.port)
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl ServeArgs {
    /// 設定を読み込み、コマンドライン引数で上書きする
    pub fn load_config(&self) -> Result<MonitorConfig, MonitorError> {
        let mut config = MonitorConfig::load(self.config.as_deref())?;
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        Ok(config)
    }
}

/// JWT秘密鍵を決定する（未設定ならランダム生成）
pub fn resolve_jwt_secret(configured: Option<&str>) -> String {
    match configured.map(str::trim).filter(|s| !s.is_empty()) {
        Some(secret) => secret.to_string(),
        None => {
            warn!("auth.jwt_secret is not set; generated a random secret (tokens will not survive a restart)");
            crate::auth::generate_jwt_secret()
        }
    }
}

/// サーバーを起動し、終了まで待つ
pub async fn execute(config: MonitorConfig) -> Result<(), MonitorError> {
    info!("healthmon v{}", env!("CARGO_PKG_VERSION"));

    let db_pool = crate::db::migrations::initialize_database(&config.database.url).await?;

    let registry = EndpointRegistry::new(db_pool.clone()).await?;
    info!(
        "Endpoint registry initialized with {} endpoints",
        registry.count().await
    );

    let results = ResultStore::new(db_pool.clone(), registry.clone(), config.retention.on_delete);
    let notifier = Notifier::from_config(
        registry.clone(),
        &config.notifier,
        config.probe.redirect_is_failure,
    )?;
    let probe = Arc::new(HttpProbe::new(&config.probe)?);

    let shutdown = ShutdownController::default();
    let scheduler = CheckScheduler::new(
        registry.clone(),
        results.clone(),
        notifier,
        probe,
        SchedulerSettings::from_config(&config),
    )
    .spawn(shutdown.clone());

    let state = AppState {
        registry,
        results,
        scheduler: scheduler.trigger_handle(),
        db_pool,
        jwt_secret: resolve_jwt_secret(config.auth.jwt_secret.as_deref()),
        token_ttl_hours: config.auth.token_ttl_hours,
        shutdown: shutdown.clone(),
    };

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let served = crate::server::run(state, &bind_addr).await;

    shutdown.request_shutdown();
    scheduler.shutdown().await;
    served
}
