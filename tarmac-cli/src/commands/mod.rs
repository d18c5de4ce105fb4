//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod deploy;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Deploy a git repository and print its id
    Deploy {
        /// Repository URL to clone
        repo_url: String,

        /// Poll until the deployment is deployed or failed
        #[arg(short, long)]
        wait: bool,

        /// Seconds between status polls when waiting
        #[arg(long, default_value_t = 2)]
        interval: u64,
    },
    /// Show the status of a deployment
    Status {
        /// Deployment id
        id: String,
    },
}

/// Route a command to its handler
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Deploy {
            repo_url,
            wait,
            interval,
        } => deploy::deploy(config, &repo_url, wait, interval).await,
        Commands::Status { id } => deploy::status(config, &id).await,
    }
}
