use clap::Parser;
use std::path::PathBuf;

use crate::config::{AssetUrlMode, DEFAULT_OUTPUT_DIR};

/// Back up an Asana project's tasks, comments and attachments to disk.
#[derive(Parser, Debug)]
#[command(name = "asana-backup", version)]
pub struct Args {
    /// Asana personal access token
    #[arg(long, env = "ASANA_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Asana project ID
    #[arg(long)]
    pub project_id: String,

    /// Output directory
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// List attachments in the CSV but do not download them
    #[arg(long)]
    pub without_attachments: bool,

    /// How to fetch attachments that have no direct download URL
    #[arg(long, value_enum, default_value_t = AssetUrlMode::Viewer)]
    pub asset_url: AssetUrlMode,

    /// Config file (defaults to ~/.asana-backup/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
