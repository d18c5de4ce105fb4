//! Deploy and status endpoints

use tarmac_core::dto::deploy::{DeployRequest, DeployResponse, StatusResponse};
use tracing::debug;

use crate::UploadClient;
use crate::error::{ClientError, Result};

impl UploadClient {
    /// Submit a repository for deployment
    ///
    /// Returns the new deployment id once the source has been uploaded and
    /// queued for building.
    pub async fn deploy(&self, repo_url: &str) -> Result<String> {
        if repo_url.trim().is_empty() {
            return Err(ClientError::InvalidRequest(
                "repository url cannot be empty".to_string(),
            ));
        }

        let url = format!("{}/deploy", self.base_url);
        debug!(url = %url, repo = %repo_url, "Submitting deployment");

        let response = self
            .client
            .post(&url)
            .json(&DeployRequest::new(repo_url))
            .send()
            .await?;

        let body: DeployResponse = self.handle_response(response).await?;
        Ok(body.id)
    }

    /// Current status string of a deployment
    pub async fn status(&self, id: &str) -> Result<String> {
        let url = format!("{}/status", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("id", id)])
            .send()
            .await?;

        let body: StatusResponse = self.handle_response(response).await?;
        Ok(body.status)
    }
}
