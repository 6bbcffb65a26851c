use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cli::Args;

pub const DEFAULT_OUTPUT_DIR: &str = "asana_project_data";
pub const DEFAULT_API_BASE_URL: &str = "https://app.asana.com/api/1.0";
pub const DEFAULT_ASSET_BASE_URL: &str = "https://app.asana.com";
pub const DEFAULT_DEBUG_RESPONSE_PATH: &str = "debug_response.html";

/// Where attachments without a `download_url` are fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AssetUrlMode {
    /// Synthesize the asset viewer page URL from the attachment id.
    #[default]
    Viewer,
    /// Ask the API for the attachment record and use its `download_url`.
    Api,
}

/// Optional settings read from `~/.asana-backup/config.toml`.
#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub token: Option<String>,
    pub api_base_url: Option<String>,
    pub asset_base_url: Option<String>,
    pub debug_response_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub token: String,
    pub project_id: String,
    pub output_dir: PathBuf,
    pub download_attachments: bool,
    pub asset_url_mode: AssetUrlMode,
    pub api_base_url: String,
    pub asset_base_url: String,
    pub debug_response_path: PathBuf,
}

impl BackupConfig {
    pub fn new(token: &str, project_id: &str, output_dir: PathBuf) -> Self {
        Self {
            token: token.to_string(),
            project_id: project_id.to_string(),
            output_dir,
            download_attachments: true,
            asset_url_mode: AssetUrlMode::default(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            asset_base_url: DEFAULT_ASSET_BASE_URL.to_string(),
            debug_response_path: PathBuf::from(DEFAULT_DEBUG_RESPONSE_PATH),
        }
    }

    /// Merge CLI arguments over the file config. CLI values win.
    pub fn from_args(args: &Args, file: FileConfig) -> Result<Self> {
        let token = match args.token.clone().or(file.token) {
            Some(token) if !token.trim().is_empty() => token,
            _ => bail!(
                "No API token given. Pass --token, set ASANA_TOKEN, or add `token` to {}",
                config_path().display()
            ),
        };

        let mut config = Self::new(&token, &args.project_id, args.output_dir.clone());
        config.download_attachments = !args.without_attachments;
        config.asset_url_mode = args.asset_url;
        if let Some(url) = file.api_base_url {
            config.api_base_url = url;
        }
        if let Some(url) = file.asset_base_url {
            config.asset_base_url = url;
        }
        if let Some(path) = file.debug_response_path {
            config.debug_response_path = path;
        }
        Ok(config)
    }
}

fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".asana-backup")
        .join("config.toml")
}

/// Load the TOML config. The default location may be absent; an explicit
/// path must exist.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = config_path();
            if !path.exists() {
                return Ok(FileConfig::default());
            }
            path
        }
    };
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: FileConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}
