//! Main entry point for the feedly-client CLI

use clap::Parser;
use feedly_client::cli::{Cli, CliError, Commands};
use feedly_client::shutdown::ShutdownCoordinator;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feedly_client=info"));

    // Logs go to stderr so command output can be piped
    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    if let Some(addr) = cli.metrics_addr {
        feedly_client::metrics::init_metrics(addr)?;
    }

    match &cli.command {
        Commands::SetupAuth(args) => args.execute(&cli),
        Commands::ListStreams(args) => args.execute(&cli).await,
        Commands::StreamEntries(args) => {
            let shutdown = ShutdownCoordinator::shared();
            shutdown.listen_for_ctrl_c();
            args.execute(&cli, shutdown).await
        }
        Commands::ExportIocs(args) => args.execute(&cli).await,
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await.map_err(anyhow::Error::from) {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}
