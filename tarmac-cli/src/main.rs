//! Tarmac CLI
//!
//! Command-line interface for submitting deployments and checking on them.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "tarmac")]
#[command(about = "Deploy static sites from git repositories", long_about = None)]
struct Cli {
    /// Upload service URL
    #[arg(long, env = "TARMAC_UPLOAD_URL", default_value = "http://localhost:3000")]
    upload_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        upload_url: cli.upload_url,
    };

    handle_command(cli.command, &config).await
}
