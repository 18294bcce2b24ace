use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use client_core::{PipelineEvent, ProcessOutcome, SplitClient};
use shared::domain::ProcessTarget;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

mod config;

#[derive(Parser, Debug)]
#[command(
    name = "sheetsplit",
    about = "Upload a spreadsheet, split it by status, and fetch the packaged result"
)]
struct Cli {
    /// Spreadsheet to submit (.xlsx, .xls, or .csv)
    file: PathBuf,
    /// Base URL of the split service
    #[arg(long)]
    server_url: Option<String>,
    /// Directory the downloaded archive is written to
    #[arg(long)]
    output: Option<PathBuf>,
    /// Push the split rows to Google Sheets instead of downloading an archive
    #[arg(long)]
    sheets: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cli = Cli::parse();
    let mut settings = config::load_settings();
    if let Some(url) = cli.server_url.clone() {
        settings.server_url = url;
    }
    if let Some(dir) = cli.output.clone() {
        settings.download_dir = dir;
    }

    let client = SplitClient::over_http(&settings.server_url)?;
    spawn_event_renderer(&client);

    let result = run_pipeline(&client, &cli, &settings).await;
    // The session is advisory server-side state; tell it we are done even
    // when the pipeline failed partway.
    client.cleanup().await;
    result
}

fn spawn_event_renderer(client: &Arc<SplitClient>) {
    let mut rx = client.subscribe_events();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(PipelineEvent::Progress(state)) if state.visible => {
                    eprintln!("[{:>3}%] {}", state.percent, state.label);
                }
                Ok(PipelineEvent::ErrorShown(message)) => {
                    eprintln!("error: {message}");
                }
                Ok(PipelineEvent::DownloadStarted { zip_filename }) => {
                    eprintln!("downloading {zip_filename}...");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn run_pipeline(client: &SplitClient, cli: &Cli, settings: &config::Settings) -> Result<()> {
    let file_name = cli
        .file
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("invalid file path: {}", cli.file.display()))?
        .to_string();
    let bytes = tokio::fs::read(&cli.file)
        .await
        .with_context(|| format!("failed to read {}", cli.file.display()))?;

    let uploaded = client
        .upload(&file_name, bytes)
        .await
        .map_err(|err| anyhow::anyhow!("upload failed: {err}"))?;
    println!(
        "uploaded {} ({} rows, {} columns)",
        uploaded.file_name,
        uploaded.rows,
        uploaded.columns.len()
    );

    let target = if cli.sheets {
        ProcessTarget::GoogleSheets
    } else {
        ProcessTarget::DownloadZip
    };
    let outcome = client
        .process(target)
        .await
        .map_err(|err| anyhow::anyhow!("processing failed: {err}"))?;

    match outcome {
        ProcessOutcome::Archive(response) => {
            println!(
                "split into {} files covering {} records",
                response.files_created, response.total_records
            );
            for (status, count) in &response.status_summary {
                println!("  {status}: {count}");
            }
            let bytes = client
                .download()
                .await
                .map_err(|err| anyhow::anyhow!("download failed: {err}"))?;
            let path = write_archive(&settings.download_dir, &response.zip_filename, &bytes).await?;
            println!("saved {}", path.display());
        }
        ProcessOutcome::Sheets(response) => {
            println!("{} ({} rows)", response.message, response.rows_updated);
        }
    }

    Ok(())
}

async fn write_archive(dir: &Path, zip_filename: &str, bytes: &[u8]) -> Result<PathBuf> {
    // The service names the archive; refuse anything that would escape the
    // chosen directory.
    if zip_filename.contains('/') || zip_filename.contains('\\') || zip_filename.contains("..") {
        bail!("refusing suspicious archive name: {zip_filename}");
    }
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(zip_filename);
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "archive written");
    Ok(path)
}
