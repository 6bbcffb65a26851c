use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::api::TaskSource;
use crate::assemble::assemble;
use crate::attachments::AttachmentResolver;
use crate::config::BackupConfig;
use crate::export::{write_csv, CSV_FILE_NAME};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSummary {
    pub tasks: usize,
    pub attachments_saved: usize,
    pub attachments_failed: usize,
    pub csv_path: PathBuf,
}

/// List the project's tasks, assemble each one, download attachments when
/// enabled, then write the CSV. Rows follow the task listing order.
///
/// Any API failure aborts the run. A failed attachment download is logged and
/// skipped unless it failed on the local filesystem.
pub async fn run_backup(source: &dyn TaskSource, config: &BackupConfig) -> Result<BackupSummary> {
    let tasks = source
        .list_tasks(&config.project_id)
        .await
        .with_context(|| format!("Failed to list tasks for project {}", config.project_id))?;

    let mut resolver = if config.download_attachments {
        Some(AttachmentResolver::new(config)?)
    } else {
        None
    };

    let mut records = Vec::with_capacity(tasks.len());
    let mut saved = 0;
    let mut failed = 0;

    for task in &tasks {
        debug!(task_id = %task.gid, "assembling task {}", task.name);
        let record = assemble(source, &task.gid).await?;
        info!(task_id = %record.id(), "fetched task {}", record.task_name());

        if let Some(resolver) = resolver.as_mut() {
            for attachment in &record.attachments {
                match resolver
                    .resolve_and_save(source, attachment, &record.details)
                    .await
                {
                    Ok(_) => saved += 1,
                    Err(err) if err.is_recoverable() => failed += 1,
                    Err(err) => {
                        return Err(err).with_context(|| {
                            format!("Failed to save attachments for task {}", record.id())
                        })
                    }
                }
            }
        }

        records.push(record);
    }

    let csv_path = config.output_dir.join(CSV_FILE_NAME);
    write_csv(&records, &csv_path)?;
    info!(path = %csv_path.display(), rows = records.len(), "saved data to CSV");

    if let Some(resolver) = &resolver {
        resolver.finish().await?;
    }
    if failed > 0 {
        warn!(failed, "some attachments could not be downloaded");
    }

    Ok(BackupSummary {
        tasks: records.len(),
        attachments_saved: saved,
        attachments_failed: failed,
        csv_path,
    })
}
