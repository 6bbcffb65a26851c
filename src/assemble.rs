use anyhow::{ensure, Context, Result};

use crate::api::TaskSource;
use crate::model::record::BackupRecord;
use crate::model::task::{Assignee, TaskDetails};

/// Fetch details, stories and attachments for one task, in that order.
pub async fn assemble(source: &dyn TaskSource, task_id: &str) -> Result<BackupRecord> {
    let details = source
        .get_task_details(task_id)
        .await
        .with_context(|| format!("Failed to fetch details for task {task_id}"))?;
    ensure!(
        details.gid == task_id,
        "Task details for {task_id} came back with id {}",
        details.gid
    );

    let comments = source
        .get_task_comments(task_id)
        .await
        .with_context(|| format!("Failed to fetch stories for task {task_id}"))?;
    let attachments = source
        .get_task_attachments(task_id)
        .await
        .with_context(|| format!("Failed to fetch attachments for task {task_id}"))?;

    Ok(BackupRecord::new(
        normalize_assignee(details),
        comments,
        attachments,
    ))
}

pub fn normalize_assignee(mut details: TaskDetails) -> TaskDetails {
    if details.assignee.is_none() {
        details.assignee = Some(Assignee::unassigned());
    }
    details
}
