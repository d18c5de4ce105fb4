//! Deployment domain types

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::keys;

/// A single build-and-publish unit
///
/// Deployments are never persisted as a whole: the id is the only thing that
/// travels through the build queue, and the status lives in the status store.
/// This struct ties the id to the storage prefixes derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub source_prefix: String,
    pub dist_prefix: String,
}

impl Deployment {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            source_prefix: keys::source_prefix(&id),
            dist_prefix: keys::dist_prefix(&id),
            id,
        }
    }
}

/// Deployment lifecycle status
///
/// `Uploaded -> Building -> Deployed`, with `Failed` reachable from `Building`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Uploaded,
    Building,
    Deployed,
    Failed,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Uploaded => "uploaded",
            DeploymentStatus::Building => "building",
            DeploymentStatus::Deployed => "deployed",
            DeploymentStatus::Failed => "failed",
        }
    }

    /// Whether the deployment will not change status again
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentStatus::Deployed | DeploymentStatus::Failed)
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored status string is not a known status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown deployment status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for DeploymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(DeploymentStatus::Uploaded),
            "building" => Ok(DeploymentStatus::Building),
            "deployed" => Ok(DeploymentStatus::Deployed),
            "failed" => Ok(DeploymentStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
