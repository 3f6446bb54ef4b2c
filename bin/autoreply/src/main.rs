mod commands;
mod logging;

use anyhow::Context;
use autoreply_core::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "autoreply")]
#[command(about = "Multi-account seller chat auto-reply bot", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the JSON config file (environment variables override it)
    #[arg(short, long, global = true, default_value = "autoreply.json")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reply loop for every configured account (default)
    Run,

    /// Show configured accounts and today's reply counts
    Status,

    /// Manage per-account reply history
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },

    /// Run environment diagnostics
    Doctor,
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// Forget today's replied conversations for one account
    Clear {
        /// Account id (case-insensitive)
        account: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load_with_env(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let _guard = logging::init(cli.verbose, Some(&config.paths().logs_dir))?;
            commands::run::run(config).await?;
        }
        Commands::Status => {
            logging::init(cli.verbose, None)?;
            commands::status::run(&config)?;
        }
        Commands::History { command } => {
            logging::init(cli.verbose, None)?;
            match command {
                HistoryCommands::Clear { account } => {
                    commands::history::clear(&config, &account)?;
                }
            }
        }
        Commands::Doctor => {
            logging::init(cli.verbose, None)?;
            commands::doctor::run(&config)?;
        }
    }

    Ok(())
}
