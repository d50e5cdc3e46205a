//! healthmon エントリーポイント

use clap::Parser;
use healthmon::cli::{migrate, serve, Cli, Commands};
use healthmon::error::MonitorError;
use healthmon::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), MonitorError> {
    match cli.command {
        Some(Commands::Migrate(args)) => {
            let config = args.load_config()?;
            let _guard = logging::init(&config.logging)?;
            migrate::execute(&config).await
        }
        Some(Commands::Serve(args)) => serve_with(args).await,
        None => serve_with(cli.serve).await,
    }
}

async fn serve_with(args: serve::ServeArgs) -> Result<(), MonitorError> {
    let config = args.load_config()?;
    let _guard = logging::init(&config.logging)?;
    serve::execute(config).await
}
