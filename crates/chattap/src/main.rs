//! ChatTap Daemon - HTTP proxy that records chat-completion conversations

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use chattap::config::Config;
use chattap::error::Result;
use chattap::proxy::ProxyServer;

const DEFAULT_FILTER: &str = "info,chattap=debug";

/// ChatTap - Transparent HTTP proxy that records your chat-completion traffic
#[derive(Parser)]
#[command(name = "chattap")]
#[command(about = "A transparent HTTP proxy that records chat-completion conversations")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the proxy server (default command)
    #[command(name = "serve")]
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    init_logging(config.logging.filter.as_deref());

    match cli.command {
        None | Some(Command::Serve) => serve(config).await,
    }
}

/// `RUST_LOG` wins, then the configured filter, then the default
fn init_logging(configured: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or(DEFAULT_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config: Config) -> Result<()> {
    tracing::info!("Starting ChatTap daemon");
    tracing::debug!("Config loaded: {:?}", config);

    ProxyServer::new(config).serve().await?;

    tracing::info!("ChatTap daemon stopped");
    Ok(())
}
