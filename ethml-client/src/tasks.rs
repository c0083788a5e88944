//! Task-related API endpoints

use crate::DispatcherClient;
use crate::error::Result;
use ethml_core::domain::task::TaskId;
use ethml_core::dto::task::{CreateJob, SubmitTask, TaskCreated, TaskStatusResponse};

impl DispatcherClient {
    // =============================================================================
    // Task Intake
    // =============================================================================

    /// Submit a paid prediction request
    ///
    /// The dispatcher creates the task on the ledger and queues it.
    ///
    /// # Returns
    /// The ledger-issued task id
    pub async fn submit_task(&self, req: SubmitTask) -> Result<TaskCreated> {
        let url = format!("{}/api/tasks", self.base_url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Queue a task that already exists on the ledger
    ///
    /// Fails with a 409 API error if the dispatcher already knows the task.
    pub async fn create_job(&self, req: CreateJob) -> Result<TaskCreated> {
        let url = format!("{}/api/jobs", self.base_url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Get a task's status
    ///
    /// # Arguments
    /// * `task_id` - The ledger task id
    ///
    /// # Returns
    /// The local task record, plus the ledger's view when it was reachable
    pub async fn get_task(&self, task_id: TaskId) -> Result<TaskStatusResponse> {
        let url = format!("{}/api/tasks/{}", self.base_url, task_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
