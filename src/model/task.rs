use serde::Deserialize;

pub const UNASSIGNED: &str = "Unassigned";

/// Row of the project task listing. Only `gid` drives the backup loop.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSummary {
    pub gid: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Assignee {
    #[serde(default)]
    pub name: String,
}

impl Assignee {
    pub fn unassigned() -> Self {
        Self {
            name: UNASSIGNED.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubtaskRef {
    #[allow(dead_code)]
    pub gid: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskDetails {
    pub gid: String,
    #[serde(default)]
    pub name: String,
    pub assignee: Option<Assignee>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: Option<String>,
    pub due_on: Option<String>,
    #[allow(dead_code)]
    pub notes: Option<String>,
    #[serde(default)]
    pub subtasks: Vec<SubtaskRef>,
}

/// A story on a task. Only the text survives into the export.
#[derive(Debug, Clone, Deserialize)]
pub struct Story {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    pub gid: String,
    pub name: Option<String>,
    pub download_url: Option<String>,
}

impl Attachment {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}
