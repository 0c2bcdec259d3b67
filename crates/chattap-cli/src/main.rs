use std::path::PathBuf;

use clap::{Parser, Subcommand};
use chattap::config::Config;
use chattap_cli::commands::{ConfigCommand, ListCommand, ShowCommand, StatsCommand};
use chattap_cli::document::load_document;
use chattap_cli::error::CliResult;
use chattap_cli::output::OutputFormat;

#[derive(Parser)]
#[command(name = "chattap-cli")]
#[command(about = "ChatTap CLI - Inspect conversations recorded by the chattap proxy")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(long, short = 'd', global = true, help = "Path to data directory")]
    pub data_dir: Option<PathBuf>,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "List recorded conversations, newest first")]
    List(ListCommand),

    #[clap(about = "Show one recorded conversation")]
    Show(ShowCommand),

    #[clap(about = "Show log statistics")]
    Stats(StatsCommand),

    #[clap(about = "Print the effective configuration")]
    Config(ConfigCommand),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir.clone() {
        config.storage.data_dir = data_dir;
    }

    match &cli.command {
        Command::List(cmd) => cmd.execute(&load_document(&config)?, format),
        Command::Show(cmd) => cmd.execute(&load_document(&config)?, format),
        Command::Stats(cmd) => cmd.execute(&load_document(&config)?, format),
        Command::Config(cmd) => cmd.execute(&config, format),
    }
}
