//! Deploy API Handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
};
use tarmac_core::dto::deploy::{DeployRequest, DeployResponse, StatusQuery, StatusResponse};

use crate::api::error::{ApiError, ApiResult};
use crate::service::{DeployError, DeployService};

/// POST /deploy
/// Clone a repository and queue it for building
///
/// A request that is not JSON at all is treated as an empty body, so it
/// fails on the missing repository URL. Malformed JSON is a 400 as well.
pub async fn deploy(
    State(service): State<Arc<DeployService>>,
    payload: Result<Json<DeployRequest>, JsonRejection>,
) -> ApiResult<Json<DeployResponse>> {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(JsonRejection::MissingJsonContentType(_)) => DeployRequest::default(),
        Err(rejection) => return Err(ApiError::BadRequest(rejection.body_text())),
    };

    let id = service
        .deploy(req.repo_url.as_deref())
        .await
        .map_err(|e| match e {
            DeployError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal {
                message: "Deployment failed. Please try again.",
                detail: other.to_string(),
            },
        })?;

    Ok(Json(DeployResponse { id }))
}

/// GET /status?id=...
/// Current status of a deployment
pub async fn status(
    State(service): State<Arc<DeployService>>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<StatusResponse>> {
    let status = service
        .status(query.id.as_deref())
        .await
        .map_err(|e| match e {
            DeployError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            DeployError::NotFound(_) => ApiError::NotFound("Status not found".to_string()),
            other => ApiError::Internal {
                message: "Failed to get status. Please try again.",
                detail: other.to_string(),
            },
        })?;

    Ok(Json(StatusResponse { status }))
}
