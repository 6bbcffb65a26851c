mod api;
mod assemble;
mod attachments;
mod backup;
mod cli;
mod config;
mod export;
mod model;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use api::asana::AsanaClient;
use config::BackupConfig;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("asana_backup={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    init_tracing(args.verbose);

    let file_config = config::load_file_config(args.config.as_deref())?;
    let config = BackupConfig::from_args(&args, file_config)?;

    let client = AsanaClient::new(&config.api_base_url, &config.token);
    let summary = backup::run_backup(&client, &config).await?;

    println!(
        "Backed up {} tasks to {}",
        summary.tasks,
        config.output_dir.display()
    );
    if config.download_attachments {
        println!(
            "  {} attachments saved, {} failed",
            summary.attachments_saved, summary.attachments_failed
        );
    }

    Ok(())
}
