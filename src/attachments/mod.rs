pub mod filename;
pub mod folder;

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::api::TaskSource;
use crate::config::{AssetUrlMode, BackupConfig};
use crate::model::task::{Attachment, TaskDetails};
use folder::FolderIndex;

pub const ATTACHMENTS_DIR: &str = "attachments";
pub const DOWNLOAD_CHUNK_SIZE: usize = 8 * 1024;
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: StatusCode,
        body: Vec<u8>,
    },
    #[error("failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Network and HTTP failures are skipped; local filesystem failures are not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DownloadError::Io { .. })
    }

    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| DownloadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Downloads attachment bytes into `<output>/attachments/<task folder>/`.
///
/// Downloads go out without the API bearer token and with a browser
/// user-agent, since the asset URLs are meant for anonymous browser access.
pub struct AttachmentResolver {
    client: reqwest::Client,
    mode: AssetUrlMode,
    asset_base_url: String,
    debug_response_path: PathBuf,
    folders: FolderIndex,
}

impl AttachmentResolver {
    pub fn new(config: &BackupConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .context("Failed to build download client")?;

        Ok(Self {
            client,
            mode: config.asset_url_mode,
            asset_base_url: config.asset_base_url.trim_end_matches('/').to_string(),
            debug_response_path: config.debug_response_path.clone(),
            folders: FolderIndex::new(config.output_dir.join(ATTACHMENTS_DIR)),
        })
    }

    /// Asset viewer page for an attachment. This renders HTML rather than
    /// serving the raw file.
    pub fn viewer_url(&self, attachment_id: &str) -> String {
        format!(
            "{}/app/asana/-/get_asset?asset_id={attachment_id}",
            self.asset_base_url
        )
    }

    pub async fn source_url(&self, source: &dyn TaskSource, attachment: &Attachment) -> String {
        if let Some(url) = attachment.download_url.as_deref().filter(|u| !u.is_empty()) {
            return url.to_string();
        }

        if self.mode == AssetUrlMode::Api {
            match source.get_attachment(&attachment.gid).await {
                Ok(fresh) => {
                    if let Some(url) = fresh.download_url.filter(|u| !u.is_empty()) {
                        return url;
                    }
                    warn!(
                        attachment_id = %attachment.gid,
                        "API has no download_url for attachment, using viewer URL"
                    );
                }
                Err(err) => warn!(
                    attachment_id = %attachment.gid,
                    error = %err,
                    "attachment lookup failed, using viewer URL"
                ),
            }
        }

        self.viewer_url(&attachment.gid)
    }

    /// Download one attachment for `task`. Failures are logged here; HTTP
    /// failures also leave their body in the debug response file.
    pub async fn resolve_and_save(
        &mut self,
        source: &dyn TaskSource,
        attachment: &Attachment,
        task: &TaskDetails,
    ) -> Result<PathBuf, DownloadError> {
        let url = self.source_url(source, attachment).await;

        match self.download(&url, attachment, task).await {
            Ok(path) => {
                info!(
                    task_id = %task.gid,
                    path = %path.display(),
                    "downloaded attachment {} for task {}",
                    attachment.display_name(),
                    task.name
                );
                Ok(path)
            }
            Err(err) => {
                let cause = std::error::Error::source(&err)
                    .map(ToString::to_string)
                    .unwrap_or_default();
                error!(
                    task_id = %task.gid,
                    attachment_id = %attachment.gid,
                    url = %url,
                    error = %err,
                    cause = %cause,
                    "failed to download attachment {} for task {}",
                    attachment.display_name(),
                    task.name
                );
                if let DownloadError::Status { body, .. } = &err {
                    self.save_debug_response(body).await;
                }
                Err(err)
            }
        }
    }

    async fn download(
        &mut self,
        url: &str,
        attachment: &Attachment,
        task: &TaskDetails,
    ) -> Result<PathBuf, DownloadError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| DownloadError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
            return Err(DownloadError::Status {
                url: url.to_string(),
                status,
                body,
            });
        }

        let disposition = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

        let folder = self.folders.folder_for(&task.gid, &task.name);
        tokio::fs::create_dir_all(&folder)
            .await
            .map_err(DownloadError::io(&folder))?;

        let name = filename::choose_filename(disposition.as_deref(), attachment.name.as_deref());
        let name = filename::unique_filename(&name, &folder)
            .await
            .map_err(DownloadError::io(&folder))?;
        let path = folder.join(name);

        write_body(resp, url, &path).await?;
        Ok(path)
    }

    async fn save_debug_response(&self, body: &[u8]) {
        match tokio::fs::write(&self.debug_response_path, body).await {
            Ok(()) => info!(
                path = %self.debug_response_path.display(),
                "saved debug response"
            ),
            Err(err) => warn!(
                path = %self.debug_response_path.display(),
                error = %err,
                "could not save debug response"
            ),
        }
    }

    /// Persist the folder index once all downloads are done.
    pub async fn finish(&self) -> Result<Option<PathBuf>> {
        self.folders.save().await
    }
}

async fn write_body(resp: reqwest::Response, url: &str, path: &Path) -> Result<u64, DownloadError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(DownloadError::io(path))?;
    let mut stream = resp.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(source) => {
                drop(file);
                let _ = tokio::fs::remove_file(path).await;
                return Err(DownloadError::Transport {
                    url: url.to_string(),
                    source,
                });
            }
        };
        for piece in chunk.chunks(DOWNLOAD_CHUNK_SIZE) {
            file.write_all(piece)
                .await
                .map_err(DownloadError::io(path))?;
        }
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(DownloadError::io(path))?;
    Ok(written)
}
