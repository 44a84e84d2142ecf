//! Group index merging
//!
//! A group index is built by merging the indexing contexts of every member
//! repository into one context. Temporary group indexes are tracked with a
//! TTL and swept once it elapses.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use archiva_core::RepositoryGroup;
use chrono::Utc;

use crate::context::IndexingContext;
use crate::engine::IndexEngine;
use crate::error::Result;
use crate::packer::IndexPacker;

/// Suffix of the context id of a persistent group index
const MERGED_SUFFIX: &str = "-merged";

/// Parameters of one merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMergerRequest {
    pub group_id: String,
    /// Members whose indexes are merged, in order
    pub repositories_ids: Vec<String>,
    /// Also write a packed, downloadable index
    pub pack_index: bool,
    /// Index location relative to the group directory
    pub merged_index_path: String,
    /// Lifetime of a temporary merged index
    pub merged_index_ttl: Duration,
    /// Track the result for TTL-based cleanup
    pub temporary: bool,
    /// Explicit directory of a persistent index; temporary indexes always
    /// get a fresh directory below the merger's work directory
    pub merged_index_directory: Option<PathBuf>,
}

impl IndexMergerRequest {
    pub fn new(group_id: impl Into<String>, repositories_ids: Vec<String>) -> Self {
        Self {
            group_id: group_id.into(),
            repositories_ids,
            pack_index: false,
            merged_index_path: archiva_core::repository::DEFAULT_INDEX_PATH.to_string(),
            merged_index_ttl: Duration::from_secs(30 * 60),
            temporary: false,
            merged_index_directory: None,
        }
    }

    /// Request the merged index of a configured group
    pub fn for_group(group: &RepositoryGroup) -> Self {
        let mut request = Self::new(&group.id, group.repositories.clone());
        request.merged_index_path = group.merged_index_path.clone();
        request.merged_index_ttl = group.merged_index_ttl;
        request.merged_index_directory = group
            .location
            .as_ref()
            .map(|location| location.join(&group.merged_index_path));
        request
    }

    pub fn with_pack(mut self, pack: bool) -> Self {
        self.pack_index = pack;
        self
    }

    pub fn temporary(mut self, ttl: Duration) -> Self {
        self.temporary = true;
        self.merged_index_ttl = ttl;
        self
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.merged_index_directory = Some(directory.into());
        self
    }
}

/// A merged index scheduled for cleanup once its TTL elapses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporaryGroupIndex {
    pub directory: PathBuf,
    /// Id of the merged indexing context
    pub index_id: String,
    pub group_id: String,
    pub ttl: Duration,
    pub created: Instant,
}

impl TemporaryGroupIndex {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) >= self.ttl
    }
}

/// Holds a group in the running set until dropped
struct RunningGroupGuard<'a> {
    running: &'a Mutex<HashSet<String>>,
    group_id: String,
}

impl<'a> RunningGroupGuard<'a> {
    /// `None` if a merge of the group is already running
    fn acquire(running: &'a Mutex<HashSet<String>>, group_id: &str) -> Option<Self> {
        let inserted = running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(group_id.to_string());
        inserted.then(|| Self {
            running,
            group_id: group_id.to_string(),
        })
    }
}

impl Drop for RunningGroupGuard<'_> {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.group_id);
    }
}

/// Builds group indexes and owns the temporary ones
#[derive(Debug)]
pub struct IndexMerger {
    engine: Arc<IndexEngine>,
    packer: IndexPacker,
    work_dir: PathBuf,
    running_groups: Mutex<HashSet<String>>,
    temporary_indexes: Mutex<Vec<TemporaryGroupIndex>>,
    sequence: AtomicU64,
}

impl IndexMerger {
    /// `work_dir` receives temporary indexes and indexes without explicit location
    pub fn new(engine: Arc<IndexEngine>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            packer: IndexPacker::new(),
            work_dir: work_dir.into(),
            running_groups: Mutex::new(HashSet::new()),
            temporary_indexes: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn engine(&self) -> &Arc<IndexEngine> {
        &self.engine
    }

    /// Merge the indexes of the requested repositories.
    ///
    /// Returns `Ok(None)` without doing anything while another merge of the
    /// same group is running.
    pub fn build_merged_index(
        &self,
        request: &IndexMergerRequest,
    ) -> Result<Option<Arc<IndexingContext>>> {
        let Some(_guard) = RunningGroupGuard::acquire(&self.running_groups, &request.group_id)
        else {
            tracing::info!(
                "Merged index of group {} is already being built, skipping",
                request.group_id
            );
            return Ok(None);
        };

        let started = Instant::now();
        let (index_id, directory) = self.target_of(request);
        std::fs::create_dir_all(&directory)?;

        // Members are merged off to the side; the group index then takes the
        // result in one transaction, so searches never see a partial index
        let staging = IndexingContext::open_memory(&index_id, &request.group_id)?;
        for repository_id in &request.repositories_ids {
            match self.engine.indexing_context(repository_id) {
                Some(context) => {
                    staging.merge_from(&context)?;
                }
                None => {
                    tracing::warn!(
                        "No indexing context for repository {} of group {}, skipping",
                        repository_id,
                        request.group_id
                    );
                }
            }
        }

        let merged = match self.engine.indexing_context(&index_id) {
            Some(current) if current.directory() == directory => current,
            _ => self
                .engine
                .replace_indexing_context(&index_id, &request.group_id, &directory)?,
        };
        merged.replace_all(&staging.records()?)?;
        merged.optimize()?;

        if request.pack_index {
            self.packer.pack(&merged, &directory)?;
        }

        if request.temporary {
            self.temporary_indexes()
                .push(TemporaryGroupIndex {
                    directory: directory.clone(),
                    index_id: index_id.clone(),
                    group_id: request.group_id.clone(),
                    ttl: request.merged_index_ttl,
                    created: Instant::now(),
                });
        }

        tracing::info!(
            "Merged index of group {} built in {} ms ({} artifacts)",
            request.group_id,
            started.elapsed().as_millis(),
            merged.artifact_count()?
        );
        Ok(Some(merged))
    }

    fn target_of(&self, request: &IndexMergerRequest) -> (String, PathBuf) {
        if request.temporary {
            let index_id = format!(
                "{}-{}-{}",
                request.group_id,
                Utc::now().format("%Y%m%d%H%M%S%3f"),
                self.sequence.fetch_add(1, Ordering::Relaxed)
            );
            // Never the group's own location: cleanup deletes the directory
            let directory = self.work_dir.join(&index_id);
            (index_id, directory)
        } else {
            let directory = request.merged_index_directory.clone().unwrap_or_else(|| {
                self.work_dir
                    .join(&request.group_id)
                    .join(&request.merged_index_path)
            });
            (format!("{}{}", request.group_id, MERGED_SUFFIX), directory)
        }
    }

    /// Drop a temporary index: its context, its directory and its tracking.
    ///
    /// Best effort and idempotent; failures are logged.
    pub fn clean_temporary_group_index(&self, entry: &TemporaryGroupIndex) {
        if let Err(e) = self.engine.remove_indexing_context(&entry.index_id, false) {
            tracing::warn!("Failed to close indexing context {}: {}", entry.index_id, e);
        }

        match std::fs::remove_dir_all(&entry.directory) {
            Ok(()) => tracing::debug!("Removed temporary index {}", entry.directory.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to delete temporary index {}: {}",
                entry.directory.display(),
                e
            ),
        }

        self.temporary_indexes()
            .retain(|t| t.index_id != entry.index_id);
    }

    /// Snapshot of the tracked temporary indexes
    pub fn temporary_group_indexes(&self) -> Vec<TemporaryGroupIndex> {
        self.temporary_indexes().clone()
    }

    /// Clean every temporary index whose TTL elapsed; returns how many
    pub fn purge_expired_temporary_indexes(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<TemporaryGroupIndex> = self
            .temporary_indexes()
            .iter()
            .filter(|t| t.is_expired(now))
            .cloned()
            .collect();

        for entry in &expired {
            tracing::debug!(
                "Temporary index {} of group {} expired",
                entry.index_id,
                entry.group_id
            );
            self.clean_temporary_group_index(entry);
        }
        expired.len()
    }

    /// Whether a merge of the group is in flight
    pub fn is_merging(&self, group_id: &str) -> bool {
        self.running_groups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(group_id)
    }

    fn temporary_indexes(&self) -> MutexGuard<'_, Vec<TemporaryGroupIndex>> {
        self.temporary_indexes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
