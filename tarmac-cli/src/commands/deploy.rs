//! Deploy and status command handlers

use std::time::Duration;

use anyhow::{Context, Result};
use colored::*;
use tarmac_client::UploadClient;
use tarmac_core::domain::deployment::DeploymentStatus;

use crate::config::Config;

/// Submit a repository, optionally waiting for the build to finish
pub async fn deploy(config: &Config, repo_url: &str, wait: bool, interval: u64) -> Result<()> {
    let client = UploadClient::new(&config.upload_url);

    println!("{} {}", "Deploying".bold(), repo_url.cyan());
    let id = client
        .deploy(repo_url)
        .await
        .context("Failed to submit deployment")?;
    println!("  {} {}", "ID:".bold(), id.green());

    if wait {
        wait_for_completion(&client, &id, Duration::from_secs(interval.max(1))).await?;
    }

    Ok(())
}

/// Print the current status of a deployment
pub async fn status(config: &Config, id: &str) -> Result<()> {
    let client = UploadClient::new(&config.upload_url);

    match client.status(id).await {
        Ok(status) => {
            println!("{} {}", id.dimmed(), colorize_status(&status));
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            println!("{}", format!("No deployment with id {id}").yellow());
            Ok(())
        }
        Err(e) => Err(e).context("Failed to fetch status"),
    }
}

async fn wait_for_completion(client: &UploadClient, id: &str, interval: Duration) -> Result<()> {
    let mut last: Option<String> = None;

    loop {
        let status = client
            .status(id)
            .await
            .context("Failed to fetch status")?;

        if last.as_deref() != Some(status.as_str()) {
            println!("  {} {}", "Status:".bold(), colorize_status(&status));
        }

        match status.parse::<DeploymentStatus>() {
            Ok(DeploymentStatus::Deployed) => {
                println!("{}", "Deployment is live.".green().bold());
                return Ok(());
            }
            Ok(DeploymentStatus::Failed) => {
                anyhow::bail!("Deployment {id} failed");
            }
            _ => {}
        }

        last = Some(status);
        tokio::time::sleep(interval).await;
    }
}

fn colorize_status(status: &str) -> ColoredString {
    match status.parse::<DeploymentStatus>() {
        Ok(DeploymentStatus::Uploaded) => status.yellow(),
        Ok(DeploymentStatus::Building) => status.cyan(),
        Ok(DeploymentStatus::Deployed) => status.green(),
        Ok(DeploymentStatus::Failed) => status.red(),
        Err(_) => status.dimmed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colorize_keeps_text() {
        colored::control::set_override(false);
        for status in ["uploaded", "building", "deployed", "failed", "mystery"] {
            assert_eq!(colorize_status(status).to_string(), status);
        }
    }
}
