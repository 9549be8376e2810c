//! faultcenter - NPU cluster fault aggregation daemon
//!
//! Watches the per-node fault configmaps, keeps the processed fault view and
//! the per-job fault ranks current until interrupted.

use anyhow::{Context, Result};
use clap::Parser;

use faultcenter::cli::{self, Cli, Command, RunArgs};
use faultcenter::config::ConfigLoader;
use faultcenter::services::{FaultSession, SessionCollaborators};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    match args.command {
        Some(Command::Config { subcommand }) => cli::handle_config_command(subcommand),
        Some(Command::Version) => {
            cli::display_version();
            Ok(())
        }
        Some(Command::Run(run)) => run_daemon(run).await,
        None => run_daemon(args.run).await,
    }
}

async fn run_daemon(args: RunArgs) -> Result<()> {
    let mut config = ConfigLoader::load().context("Failed to load configuration")?;
    config.namespace = faultcenter::kube::resolve_namespace(args.namespace.as_deref(), &config.namespace);
    if let Some(path) = args.log_file {
        config.logger.file = Some(path);
    }
    ConfigLoader::check(&config).context("Invalid configuration")?;

    cli::init_logging(args.debug, config.logger.file.as_deref(), &config.logger.level)?;
    if let Some(ref log_path) = config.logger.file {
        eprintln!("Logs written to: {}", log_path.display());
    }
    tracing::debug!(
        "Configuration loaded: namespace={}, period={}ms",
        config.namespace,
        config.center.process_period_ms
    );

    let session = FaultSession::connect(&config, SessionCollaborators::standalone(&config)).await?;
    tracing::info!("Fault center running in namespace {}", session.namespace());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested");

    session.shutdown().await;
    Ok(())
}
