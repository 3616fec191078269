//! SNQB HTTP Client
//!
//! A typed HTTP client for the analysis service API.
//!
//! Every call the batch runner makes against the service goes through
//! [`SonarClient`]: readiness probing, authentication, token issuance,
//! project registration and removal, and measure collection.
//!
//! # Example
//!
//! ```no_run
//! use snqb_client::SonarClient;
//! use snqb_core::RetryPolicy;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SonarClient::new("http://localhost:9000", "admin", "admin");
//!
//!     client
//!         .wait_until_ready(&RetryPolicy::fixed(60, Duration::from_secs(1)))
//!         .await?;
//!     let credential = client.issue_token("batch_token").await?;
//!
//!     println!("Token issued at {}", credential.issued_at);
//!     Ok(())
//! }
//! ```

pub mod error;
mod measures;
mod projects;
mod system;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use measures::MetricsOutcome;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// Administrative credentials for the service's basic-auth endpoints
#[derive(Clone)]
pub struct AdminAuth {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// HTTP client for the analysis service API
///
/// Methods are organized into logical groups:
/// - System: readiness probe, login and token issuance
/// - Projects: create, search and delete
/// - Measures: computed metric collection
#[derive(Debug, Clone)]
pub struct SonarClient {
    /// Base URL of the service (e.g., "http://localhost:9000")
    base_url: String,
    /// HTTP client instance
    client: Client,
    /// Credentials sent as basic auth to administrative endpoints
    auth: AdminAuth,
}

impl SonarClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the service API (e.g., "http://localhost:9000")
    /// * `username` - Administrative login
    /// * `password` - Administrative password
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::with_client(base_url, username, password, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            auth: AdminAuth {
                username: username.into(),
                password: password.into(),
            },
        }
    }

    /// Get the base URL of the service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attaches the administrative basic-auth header
    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.auth.username, Some(&self.auth.password))
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content
    ///
    /// This method checks the status code and returns an error if the request failed.
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fake;
