//! Worker-related API endpoints

use crate::DispatcherClient;
use crate::error::Result;
use ethml_core::dto::worker::WorkerSummary;

impl DispatcherClient {
    /// List connected workers in connection order
    pub async fn list_workers(&self) -> Result<Vec<WorkerSummary>> {
        let url = format!("{}/api/workers", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
