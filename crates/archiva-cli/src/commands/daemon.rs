//! Daemon command

use std::sync::Arc;

use archiva_core::ArchivaConfig;
use archiva_indexer::{IndexEngine, IndexMerger, Scheduler};

use crate::commands::{open_indexing_contexts, remote_index_downloader};
use crate::display;
use crate::error::{CliError, Result};

/// Run the index scheduler until interrupted
pub async fn run(config: ArchivaConfig) -> Result<()> {
    let engine = Arc::new(IndexEngine::new());
    let downloader = Arc::new(remote_index_downloader(&config, &engine));
    let opened = open_indexing_contexts(&config, &engine, &downloader)?;
    let merger = Arc::new(IndexMerger::new(
        Arc::clone(&engine),
        config.settings.work_directory(),
    ));

    let scheduler = Arc::new(Scheduler::new(
        Arc::new(config),
        engine,
        merger,
        downloader,
    ));
    let schedules = scheduler.start();
    display::success(&format!(
        "Scheduler running with {} schedules over {} indexes, press Ctrl-C to stop",
        schedules, opened
    ));

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| CliError::internal(format!("Failed to listen for Ctrl-C: {}", e)))?;

    tracing::info!("Shutting down scheduler");
    scheduler.shutdown();
    Ok(())
}
