#![cfg_attr(not(test), forbid(unsafe_code))]
#![deny(warnings, clippy::pedantic)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

//! `adpulse`: campaign performance from the terminal.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use shared::config::{Config, ConfigFormat};
use std::path::PathBuf;
use url::Url;

mod commands;
mod format;
mod logging;

/// adpulse CLI
#[derive(Parser, Debug)]
#[command(name = "adpulse", version)]
#[command(about = "Campaign performance dashboard with live per-campaign metrics", long_about = None)]
pub(crate) struct Cli {
    /// Path to a configuration file (YAML, JSON or TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL; overrides the configuration file and `ADPULSE_API_URL`
    #[arg(long, global = true)]
    api_url: Option<Url>,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the adpulse CLI
#[derive(Subcommand, Debug)]
enum Commands {
    /// List campaigns, optionally filtered by a search query
    Campaigns {
        /// Case-insensitive match against name, brand and platforms
        #[arg(long, short)]
        query: Option<String>,
    },

    /// Show one campaign and its latest metrics
    Campaign {
        /// Campaign identifier
        id: String,
    },

    /// Show account-wide aggregate insights
    Insights,

    /// Show the dashboard overview: totals, status breakdown, top budgets and campaigns
    Overview {
        /// Case-insensitive match against name, brand and platforms
        #[arg(long, short)]
        query: Option<String>,
    },

    /// Stream live metrics for one campaign
    Watch(commands::watch::WatchArgs),

    /// Print a starter configuration file
    Config {
        /// Output format: yaml, json or toml
        #[arg(long, short, default_value = "toml")]
        format: ConfigFormat,

        /// Write to this file instead of standard output
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)
        #[arg(long, short)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { format, output } => {
            return commands::config::generate_config(format, output.as_deref());
        }
        Commands::Completion { shell } => {
            commands::completion::generate_completion(shell);
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load_config(cli.config, cli.api_url)
        .context("failed to load configuration")?;
    logging::initialize_tracing(&config);

    match cli.command {
        Commands::Campaigns { query } => {
            commands::campaigns::list_campaigns(&config, query.as_deref()).await
        }
        Commands::Campaign { id } => commands::campaigns::show_campaign(&config, &id).await,
        Commands::Insights => commands::insights::show_insights(&config).await,
        Commands::Overview { query } => {
            commands::overview::show_overview(&config, query.as_deref()).await
        }
        Commands::Watch(args) => commands::watch::watch(&config, args).await,
        Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
    }
}
