//! CLI module for healthmon
//!
//! サブコマンド無しで起動した場合は `serve` として動作する。

pub mod migrate;
pub mod serve;

use clap::{Parser, Subcommand};

/// healthmon - HTTP endpoint health monitor
#[derive(Parser, Debug)]
#[command(name = "healthmon")]
#[command(version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    HEALTHMON_CONFIG                Path to a TOML config file
    HEALTHMON_LOG_LEVEL             Log filter (default: info)
    HEALTHMON__SERVER__PORT         Listen port (default: 4000)
    HEALTHMON__DATABASE__URL        Database URL (default: sqlite://healthmon.db)
    HEALTHMON__AUTH__JWT_SECRET     JWT signing key (generated if not set)
    HEALTHMON__<SECTION>__<KEY>     Any other config value
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Arguments for the default `serve` command
    #[command(flatten)]
    pub serve: serve::ServeArgs,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the API server and the check scheduler
    Serve(serve::ServeArgs),
    /// Apply database migrations and exit
    Migrate(migrate::MigrateArgs),
}
