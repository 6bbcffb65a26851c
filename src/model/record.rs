use super::task::{Attachment, Story, TaskDetails};

/// Everything exported for one task. Built during orchestration and handed
/// straight to the CSV writer.
#[derive(Debug, Clone)]
pub struct BackupRecord {
    pub details: TaskDetails,
    pub comments: Vec<Story>,
    pub attachments: Vec<Attachment>,
}

impl BackupRecord {
    pub fn new(details: TaskDetails, comments: Vec<Story>, attachments: Vec<Attachment>) -> Self {
        Self {
            details,
            comments,
            attachments,
        }
    }

    pub fn id(&self) -> &str {
        &self.details.gid
    }

    pub fn task_name(&self) -> &str {
        &self.details.name
    }
}
