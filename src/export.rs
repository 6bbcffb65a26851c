use anyhow::{Context, Result};
use std::path::Path;

use crate::model::record::BackupRecord;

pub const CSV_FILE_NAME: &str = "project_data.csv";

pub const HEADER: [&str; 9] = [
    "Task ID",
    "Task Name",
    "Assignee",
    "Status",
    "Created At",
    "Due On",
    "Comments",
    "Attachments",
    "Subtasks",
];

fn row(record: &BackupRecord) -> [String; 9] {
    let details = &record.details;
    let comments: Vec<&str> = record.comments.iter().map(|c| c.text.as_str()).collect();
    let attachments: Vec<&str> = record
        .attachments
        .iter()
        .map(|a| a.display_name())
        .collect();
    let subtasks: Vec<&str> = details
        .subtasks
        .iter()
        .filter_map(|s| s.name.as_deref())
        .collect();

    [
        details.gid.clone(),
        details.name.clone(),
        details
            .assignee
            .as_ref()
            .map(|a| a.name.clone())
            .unwrap_or_default(),
        details.completed.to_string(),
        details.created_at.clone().unwrap_or_default(),
        details.due_on.clone().unwrap_or_default(),
        comments.join("\n"),
        attachments.join("\n"),
        subtasks.join("\n"),
    ]
}

/// Write one row per record, in order, replacing any existing file.
pub fn write_csv(records: &[BackupRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    writer.write_record(HEADER)?;
    for record in records {
        writer.write_record(row(record))?;
    }
    writer.flush()?;
    Ok(())
}
