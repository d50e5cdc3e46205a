//! データベース初期化とマイグレーション実行

use crate::error::MonitorError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// ファイルDBのビジータイムアウト
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLiteデータベース接続プールを作成してマイグレーションを実行
///
/// # Arguments
/// * `database_url` - データベースURL（例: "sqlite://data/healthmon.db"）
///
/// # Returns
/// * `Ok(SqlitePool)` - 初期化済みデータベースプール
/// * `Err(MonitorError)` - 初期化失敗
pub async fn initialize_database(database_url: &str) -> Result<SqlitePool, MonitorError> {
    let pool = connect(database_url).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// 接続プールを作成する（マイグレーションなし）
///
/// ファイルDBの場合は親ディレクトリを作成し、WALモードとビジータイムアウトを設定する。
pub async fn connect(database_url: &str) -> Result<SqlitePool, MonitorError> {
    let in_memory = is_memory_url(database_url);
    if !in_memory {
        if let Some(parent) = database_file_path(database_url).and_then(|p| p.parent()) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MonitorError::Database(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
    }

    let mut options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| MonitorError::Database(format!("Invalid database URL: {}", e)))?
        .create_if_missing(true);
    let mut pool_options = SqlitePoolOptions::new();
    if in_memory {
        pool_options = pool_options.max_connections(1);
    } else {
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
    }

    tracing::info!(database_url = %database_url, "Connecting to database");
    pool_options
        .connect_with(options)
        .await
        .map_err(|e| MonitorError::Database(format!("Failed to connect to database: {}", e)))
}

/// マイグレーションを実行（sqlx::migrate!マクロを使用）
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), MonitorError> {
    tracing::info!("Running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| MonitorError::Database(format!("Failed to run migrations: {}", e)))?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// `sqlite://path?opts` / `sqlite:path` からファイルパスを取り出す
fn database_file_path(database_url: &str) -> Option<&Path> {
    let path = database_url.strip_prefix("sqlite:")?;
    let normalized = path.trim_start_matches("//");
    let without_params = normalized.split('?').next().unwrap_or(normalized);
    if without_params.is_empty() {
        None
    } else {
        Some(Path::new(without_params))
    }
}
