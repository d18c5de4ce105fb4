//! Deploy and status DTOs

use serde::{Deserialize, Serialize};

/// Body of `POST /deploy`
///
/// `repo_url` is optional at the type level so that a missing field is
/// reported as a 400 by the handler instead of a deserialization rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployRequest {
    #[serde(rename = "repoUrl", default)]
    pub repo_url: Option<String>,
}

impl DeployRequest {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: Some(repo_url.into()),
        }
    }
}

/// Response of a successful `POST /deploy`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResponse {
    pub id: String,
}

/// Query string of `GET /status`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusQuery {
    pub id: Option<String>,
}

/// Response of a successful `GET /status`
///
/// The status is the stored string, returned verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Error body returned by every failing upload-service endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
