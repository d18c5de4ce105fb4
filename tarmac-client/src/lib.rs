//! Tarmac HTTP Client
//!
//! A small, typed client for the upload service API, used by the CLI.
//!
//! # Example
//!
//! ```no_run
//! use tarmac_client::UploadClient;
//!
//! # async fn example() -> tarmac_client::Result<()> {
//! let client = UploadClient::new("http://localhost:3000");
//!
//! let id = client.deploy("https://github.com/user/site.git").await?;
//! let status = client.status(&id).await?;
//! println!("{id}: {status}");
//! # Ok(())
//! # }
//! ```

pub mod error;
mod deployments;

pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;
use tarmac_core::dto::deploy::ErrorResponse;

/// HTTP client for the Tarmac upload service
#[derive(Debug, Clone)]
pub struct UploadClient {
    /// Base URL of the upload service (e.g., "http://localhost:3000")
    base_url: String,
    client: Client,
}

impl UploadClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a client around a configured reqwest `Client` (timeouts,
    /// proxies, TLS settings)
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check the status code and deserialize the JSON body
    ///
    /// Error bodies of the form `{"error": "..."}` are unwrapped into the
    /// error message; anything else is passed through as text.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|body| body.error)
                .unwrap_or(error_text);
            return Err(ClientError::api(status.as_u16(), message));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = UploadClient::new("http://localhost:3000/");
        assert_eq!(client.base_url(), "http://localhost:3000");
    }

    #[test]
    fn test_client_with_custom_client() {
        let client = UploadClient::with_client("http://upload.internal", Client::new());
        assert_eq!(client.base_url(), "http://upload.internal");
    }
}
