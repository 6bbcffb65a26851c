pub mod asana;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::model::task::{Attachment, Story, TaskDetails, TaskSummary};

/// Failure of an authenticated read against the project API.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{endpoint} request failed")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: StatusCode },
    #[error("failed to decode {endpoint} response")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn list_tasks(&self, project_id: &str) -> Result<Vec<TaskSummary>, RequestError>;
    async fn get_task_details(&self, task_id: &str) -> Result<TaskDetails, RequestError>;
    async fn get_task_comments(&self, task_id: &str) -> Result<Vec<Story>, RequestError>;
    async fn get_task_attachments(&self, task_id: &str) -> Result<Vec<Attachment>, RequestError>;
    /// Look up a single attachment record, used to obtain a fresh `download_url`.
    async fn get_attachment(&self, attachment_id: &str) -> Result<Attachment, RequestError>;
}
