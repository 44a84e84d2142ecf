//! Merge-index command

use std::path::Path;
use std::sync::Arc;

use archiva_core::ArchivaConfig;
use archiva_indexer::{IndexEngine, IndexMerger, IndexMergerRequest};
use console::style;

use crate::commands::{open_indexing_contexts, remote_index_downloader};
use crate::display;
use crate::error::Result;

/// Build the merged index of a repository group
pub fn run(
    config: &ArchivaConfig,
    group: &str,
    temporary: bool,
    pack: bool,
    output: Option<&Path>,
) -> Result<()> {
    let group = config.repository_group(group)?;

    let engine = Arc::new(IndexEngine::new());
    let downloader = remote_index_downloader(config, &engine);
    open_indexing_contexts(config, &engine, &downloader)?;
    // A temporary index gets its own subdirectory of the output
    let work_dir = match output {
        Some(output) if temporary => output.to_path_buf(),
        _ => config.settings.work_directory(),
    };
    let merger = IndexMerger::new(Arc::clone(&engine), work_dir);

    let mut request = IndexMergerRequest::for_group(group).with_pack(pack);
    if temporary {
        request = request.temporary(group.merged_index_ttl);
    } else if let Some(output) = output {
        request = request.with_directory(output);
    }

    let Some(merged) = merger.build_merged_index(&request)? else {
        display::warning(&format!("Group {} is already being merged", group.id));
        return Ok(());
    };

    display::success(&format!(
        "Merged {} artifacts of {} into {}",
        merged.artifact_count()?,
        style(&group.id).cyan(),
        merged.directory().display()
    ));
    if temporary {
        println!(
            "    temporary index {} is not tracked after this command exits",
            merged.id()
        );
    }
    Ok(())
}
