//! EthML HTTP Client
//!
//! A simple, type-safe HTTP client for the EthML dispatcher's intake API.
//!
//! # Example
//!
//! ```no_run
//! use ethml_client::DispatcherClient;
//! use ethml_core::dto::task::SubmitTask;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = DispatcherClient::new("http://localhost:8080");
//!
//!     // Submit a paid prediction request
//!     let created = client.submit_task(SubmitTask {
//!         model_id: 1,
//!         data_point: "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG".to_string(),
//!         tip: "0.01".to_string(),
//!     }).await?;
//!
//!     println!("Created task: {}", created.task_id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod tasks;
mod workers;

// Re-export commonly used types
pub use error::{ClientError, Result};

use ethml_core::dto::health::HealthStatus;
use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the EthML dispatcher API
///
/// Methods are organized into logical groups:
/// - Task intake (submit, create job, status)
/// - Worker listing
/// - Health
#[derive(Debug, Clone)]
pub struct DispatcherClient {
    /// Base URL of the dispatcher (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl DispatcherClient {
    /// Create a new dispatcher client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the dispatcher API (e.g., "http://localhost:8080")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new dispatcher client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the dispatcher
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check dispatcher health
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// Non-2xx responses become `ClientError::ApiError` carrying the `error`
    /// field of the dispatcher's JSON error body when there is one.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(
                status.as_u16(),
                error_message(&error_text),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

/// Extracts `{"error": "..."}` from an error body, or returns the body as is
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("error")?.as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = DispatcherClient::new("http://localhost:8080");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = DispatcherClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_with_custom_client() {
        let http_client = Client::new();
        let client = DispatcherClient::with_client("http://localhost:8080", http_client);
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_error_message_unwraps_json_body() {
        assert_eq!(
            error_message(r#"{"error":"Task 4 already exists"}"#),
            "Task 4 already exists"
        );
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}
