//! Remote-index command

use std::sync::Arc;

use archiva_core::ArchivaConfig;
use archiva_indexer::{IndexEngine, RemoteIndexUpdate};

use crate::commands::remote_index_downloader;
use crate::display;
use crate::error::Result;

/// Download the index published by a remote repository
pub async fn run(config: &ArchivaConfig, remote: &str) -> Result<()> {
    let remote = config.remote_repository(remote)?;
    let engine = Arc::new(IndexEngine::new());
    let downloader = remote_index_downloader(config, &engine);

    match downloader.download(remote).await? {
        RemoteIndexUpdate::Updated { properties, context } => {
            display::success(&format!(
                "Downloaded index of {} ({} artifacts, published {})",
                remote.id,
                properties.artifact_count,
                properties.timestamp.to_rfc3339()
            ));
            println!("{}", context.directory().display());
        }
        RemoteIndexUpdate::NotModified => {
            display::success(&format!("Index of {} is up to date", remote.id));
        }
        RemoteIndexUpdate::NotAvailable => {
            display::warning(&format!("{} does not publish an index", remote.id));
        }
    }
    Ok(())
}
