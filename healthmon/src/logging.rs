//! ロギング初期化
//!
//! stdoutへの人間向け出力と、`logging.directory` 指定時の日次ローテーションJSONファイル出力。

use crate::error::MonitorError;
use healthmon_common::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ログレベルを指定する環境変数
pub const LOG_LEVEL_ENV: &str = "HEALTHMON_LOG_LEVEL";

/// ログファイル名の接頭辞
const LOG_FILE_PREFIX: &str = "healthmon.log";

/// ロギングを初期化する
///
/// 戻り値の `WorkerGuard` はファイル出力のフラッシュに必要なので、`main` で保持すること。
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>, MonitorError> {
    let filter = build_filter(&config.level);
    let stdout_layer = fmt::layer().with_target(false);

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).map_err(|e| {
                MonitorError::Internal(format!(
                    "Failed to create log directory {}: {}",
                    directory, e
                ))
            })?;
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).json();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| MonitorError::Internal(format!("Failed to initialize logging: {}", e)))?;

    Ok(guard)
}

/// フィルター文字列を決定する（`HEALTHMON_LOG_LEVEL` → `RUST_LOG` → 設定値）
fn build_filter(configured: &str) -> EnvFilter {
    let directive = filter_directive(
        std::env::var(LOG_LEVEL_ENV).ok(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
        configured,
    );
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn filter_directive(level_env: Option<String>, rust_log: Option<String>, configured: &str) -> String {
    level_env
        .filter(|v| !v.trim().is_empty())
        .or_else(|| rust_log.filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| format!("{},sqlx::query=warn", configured))
}
