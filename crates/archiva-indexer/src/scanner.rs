//! Repository scanning
//!
//! Walks a managed repository and brings its indexing context in line with
//! the artifacts on disk.

use std::collections::HashSet;
use std::path::Path;

use archiva_core::checksum::{ChecksumAlgorithm, ChecksummedFile};
use archiva_core::layout::{is_checksum, is_metadata};
use archiva_core::ManagedRepositoryContent;
use chrono::{DateTime, Utc};
use walkdir::{DirEntry, WalkDir};

use crate::context::{ArtifactRecord, IndexingContext};
use crate::error::Result;

/// Outcome of one scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStatistics {
    pub files_scanned: usize,
    pub artifacts_indexed: usize,
    /// Files that are not artifacts of the repository layout
    pub files_skipped: usize,
    /// Index entries whose file disappeared
    pub artifacts_removed: usize,
}

/// Indexes the artifacts of one managed repository
#[derive(Debug)]
pub struct ArtifactScanner<'a> {
    content: &'a ManagedRepositoryContent,
}

impl<'a> ArtifactScanner<'a> {
    pub fn new(content: &'a ManagedRepositoryContent) -> Self {
        Self { content }
    }

    /// Scan the repository into `context`
    pub fn scan(&self, context: &IndexingContext) -> Result<ScanStatistics> {
        let root = self.content.storage().location().to_path_buf();
        let index_dir = self.content.repository().index_directory();
        let mut stats = ScanStatistics::default();
        let mut records = Vec::new();

        let walker = WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !is_excluded(e, &root, &index_dir));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry during scan: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            stats.files_scanned += 1;

            let Some(path) = relative_path(entry.path(), &root) else {
                stats.files_skipped += 1;
                continue;
            };
            if is_checksum(&path) || is_metadata(&path) {
                stats.files_skipped += 1;
                continue;
            }

            match self.record_for(&path, entry.path()) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => stats.files_skipped += 1,
                Err(e) => {
                    tracing::warn!("Failed to index {}: {}", path, e);
                    stats.files_skipped += 1;
                }
            }
        }

        let present: HashSet<_> = records.iter().map(record_key).collect();
        for stale in context
            .records()?
            .into_iter()
            .filter(|r| r.repository_id == self.content.id() && !present.contains(&record_key(r)))
        {
            if context.remove(&stale)? {
                stats.artifacts_removed += 1;
            }
        }

        context.add_all(&records)?;
        stats.artifacts_indexed = records.len();

        tracing::info!(
            "Scanned {}: {} files, {} artifacts indexed, {} skipped, {} removed",
            self.content.id(),
            stats.files_scanned,
            stats.artifacts_indexed,
            stats.files_skipped,
            stats.artifacts_removed
        );
        Ok(stats)
    }

    fn record_for(&self, path: &str, file: &Path) -> Result<Option<ArtifactRecord>> {
        let Ok(reference) = self.content.layout().to_artifact(path) else {
            tracing::debug!("Not an artifact: {}", path);
            return Ok(None);
        };

        let metadata = std::fs::metadata(file)?;
        let mut record = ArtifactRecord::new(&reference, self.content.id());
        record.size = metadata.len();
        record.last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);
        record.sha1 = Some(ChecksummedFile::new(file).calculate(ChecksumAlgorithm::Sha1)?);
        Ok(Some(record))
    }
}

fn record_key(record: &ArtifactRecord) -> (String, String, String, Option<String>, String) {
    (
        record.group_id.clone(),
        record.artifact_id.clone(),
        record.version.clone(),
        record.classifier.clone(),
        record.extension.clone(),
    )
}

/// Hidden directories and the index directory itself are not content
fn is_excluded(entry: &DirEntry, root: &Path, index_dir: &Path) -> bool {
    if entry.path() == root {
        return false;
    }
    entry.file_type().is_dir()
        && (entry.path() == index_dir || entry.file_name().to_string_lossy().starts_with('.'))
}

fn relative_path(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
