//! Scan command

use archiva_core::ArchivaConfig;
use archiva_indexer::{ArtifactScanner, IndexEngine, IndexPacker};

use crate::commands::open_repository;
use crate::display;
use crate::error::Result;

/// Index the artifacts of a managed repository and pack the result
pub fn run(config: &ArchivaConfig, repository: &str, skip_pack: bool) -> Result<()> {
    let content = open_repository(config, repository)?;
    let index_dir = content.repository().index_directory();

    let engine = IndexEngine::new();
    let context = engine.add_indexing_context(repository, repository, &index_dir)?;
    let stats = ArtifactScanner::new(&content).scan(&context)?;
    context.optimize()?;
    display::print_scan_statistics(repository, &stats);

    if skip_pack || content.repository().indexing.skip_packed_index_creation {
        return Ok(());
    }
    let packed = IndexPacker::new().pack(&context, &index_dir)?;
    display::success(&format!("Packed index {}", packed.archive.display()));
    Ok(())
}
