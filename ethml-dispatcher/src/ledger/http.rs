//! HTTP Ledger
//!
//! Talks to a ledger gateway exposing the task contract over HTTP:
//!
//! - `POST {base}/contracts/{contract}/tasks` creates a task
//! - `GET  {base}/contracts/{contract}/tasks/{id}` reads a task
//! - `POST {base}/contracts/{contract}/tasks/{id}/validation` submits a result

use std::time::Duration;

use async_trait::async_trait;
use ethml_core::domain::task::{ModelId, TaskId};
use ethml_core::error::LedgerError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::Ledger;

#[derive(Serialize)]
struct ValidationRequest {
    prediction: i64,
}

#[derive(Serialize)]
struct PredictionRequest<'a> {
    model_id: ModelId,
    data_point: &'a str,
    tip: &'a str,
}

#[derive(Deserialize)]
struct PredictionResponse {
    task_id: TaskId,
}

/// Ledger client backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpLedger {
    /// `{ledger_url}/contracts/{contract}`
    contract_url: String,
    client: Client,
}

impl HttpLedger {
    /// Builds a client whose every call is bounded by `timeout`
    pub fn new(ledger_url: &str, contract: &str, timeout: Duration) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Transient(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            contract_url: format!("{}/contracts/{}", ledger_url.trim_end_matches('/'), contract),
            client,
        })
    }

    pub fn contract_url(&self) -> &str {
        &self.contract_url
    }

    fn tasks_url(&self) -> String {
        format!("{}/tasks", self.contract_url)
    }

    fn task_url(&self, task_id: TaskId) -> String {
        format!("{}/tasks/{}", self.contract_url, task_id)
    }

    /// Turns a non-2xx response into a ledger error
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, LedgerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(classify_status(status, body))
    }
}

/// Maps a failing HTTP status to a ledger error kind
///
/// 409 means the task already carries a result. 408, 429 and 5xx may succeed
/// on retry. Any other 4xx is a refusal that retrying cannot fix.
fn classify_status(status: StatusCode, body: String) -> LedgerError {
    let message = format!("{}: {}", status.as_u16(), body);

    match status {
        StatusCode::CONFLICT => LedgerError::Rejected(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            LedgerError::Transient(message)
        }
        s if s.is_client_error() => LedgerError::Refused(message),
        _ => LedgerError::Transient(message),
    }
}

/// Transport failures (connect, timeout, broken body) are always retryable
fn transport_error(err: reqwest::Error) -> LedgerError {
    LedgerError::Transient(err.to_string())
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn submit_result(&self, task_id: TaskId, prediction: i64) -> Result<(), LedgerError> {
        let url = format!("{}/validation", self.task_url(task_id));

        let response = self
            .client
            .post(&url)
            .json(&ValidationRequest { prediction })
            .send()
            .await
            .map_err(transport_error)?;

        Self::check(response).await?;
        tracing::debug!(task_id, prediction, "Ledger accepted validation");

        Ok(())
    }

    async fn request_prediction(
        &self,
        model_id: ModelId,
        data_point: &str,
        tip: &str,
    ) -> Result<TaskId, LedgerError> {
        let response = self
            .client
            .post(self.tasks_url())
            .json(&PredictionRequest {
                model_id,
                data_point,
                tip,
            })
            .send()
            .await
            .map_err(transport_error)?;

        let created: PredictionResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(transport_error)?;

        tracing::info!(task_id = created.task_id, model_id, "Ledger created task");
        Ok(created.task_id)
    }

    async fn get_task(&self, task_id: TaskId) -> Result<serde_json::Value, LedgerError> {
        let response = self
            .client
            .get(self.task_url(task_id))
            .send()
            .await
            .map_err(transport_error)?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(transport_error)
    }
}
