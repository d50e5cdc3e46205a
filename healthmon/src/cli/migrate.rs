//! migrate サブコマンド
//!
//! データベースを作成し、組み込みマイグレーションを適用して終了する。

use crate::error::MonitorError;
use clap::Args;
use healthmon_common::config::MonitorConfig;
use std::path::PathBuf;
use tracing::info;

/// migrate サブコマンドの引数
#[derive(Args, Debug, Clone, Default)]
pub struct MigrateArgs {
    /// Path to a TOML config file
    #[arg(short, long, env = "HEALTHMON_CONFIG")]
    pub config: Option<PathBuf>,
}

impl MigrateArgs {
    /// 設定を読み込む
    pub fn load_config(&self) -> Result<MonitorConfig, MonitorError> {
        Ok(MonitorConfig::load(self.config.as_deref())?)
    }
}

/// マイグレーションを実行する
pub async fn execute(config: &MonitorConfig) -> Result<(), MonitorError> {
    let pool = crate::db::migrations::initialize_database(&config.database.url).await?;
    info!(database = %config.database.url, "Database migrations applied");
    pool.close().await;
    Ok(())
}
