//! EchoSync CLI - command-line interface for multi-provider dispatch
//!
//! Provides the `echosync` command for sending a message to several AI
//! providers at once and for managing the encrypted credential vault.

mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use echosync_core::{CredentialVault, EchoConfig};
use echosync_orchestrator::DispatchCoordinator;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use commands::{credentials, dispatch, status, CredentialsCommand};

/// EchoSync - one message, every provider
#[derive(Parser, Debug)]
#[command(
    name = "echosync",
    author,
    version,
    about = "EchoSync - concurrent multi-provider AI dispatch",
    long_about = "EchoSync sends one message to several AI providers concurrently and returns every reply keyed by node.\nProviders without a stored key answer from a local simulator."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Config file (defaults to ./echosync.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a message to the selected nodes
    ///
    /// Without --nodes the task classifier picks the nodes.
    Dispatch {
        /// Message to send
        message: String,

        /// Node selection: "all", one key, or a comma-separated list
        #[arg(short, long)]
        nodes: Option<String>,
    },

    /// Manage provider credentials
    #[command(subcommand)]
    Credentials(CredentialsCommand),

    /// Show nodes, credentials and uptime
    Status,

    /// Show a compact health report
    Health,

    /// List the configured nodes and their current mode
    Nodes,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .init();

    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    let config = EchoConfig::load(args.config.as_deref())?;
    debug!(
        environment = %config.server.environment,
        data_dir = %config.storage.data_dir.display(),
        "Configuration loaded"
    );
    let vault = Arc::new(CredentialVault::new(&config));
    let coordinator = DispatchCoordinator::new(&config, vault);
    coordinator.initialize().await;

    match command {
        Command::Dispatch { message, nodes } => {
            dispatch::execute(&coordinator, &message, nodes.as_deref(), args.json).await?;
        }
        Command::Credentials(cmd) => {
            credentials::execute(&coordinator, cmd, args.json).await?;
        }
        Command::Status => {
            status::execute_status(&coordinator, args.json).await?;
        }
        Command::Health => {
            status::execute_health(&coordinator, args.json).await?;
        }
        Command::Nodes => {
            status::execute_nodes(&coordinator, args.json).await?;
        }
    }

    Ok(())
}
