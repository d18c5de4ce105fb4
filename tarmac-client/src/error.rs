//! Client errors
//!
//! The upload service answers every failure with `{"error": message}`;
//! `Api` carries that message back to the caller unchanged.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never got an HTTP response
    #[error("could not reach the upload service: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upload service returned {status}: {message}")]
    Api { status: u16, message: String },

    /// A success response whose body was not the expected JSON
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// Caught locally, nothing was sent
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// `GET /status` for an id the service has never seen
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    /// Failures worth retrying: the deployment may succeed on a second try
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status >= 500)
    }
}
