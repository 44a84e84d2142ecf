//! Scheduling of indexing tasks
//!
//! Each configured cron expression drives one background loop. Loops and
//! on-demand requests both go through [`Scheduler::queue_task`], which refuses
//! to start a task that is still running.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use archiva_core::{ArchivaConfig, ManagedRepositoryContent};
use chrono::Utc;
use cron::Schedule;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::engine::IndexEngine;
use crate::error::{IndexError, Result};
use crate::merger::{IndexMerger, IndexMergerRequest};
use crate::packer::IndexPacker;
use crate::remote::RemoteIndexDownloader;
use crate::scanner::ArtifactScanner;

/// A unit of background work
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexTask {
    /// Index the content of a managed repository
    ScanRepository(String),
    /// Download the index published by a remote repository
    DownloadRemoteIndex(String),
    /// Rebuild the merged index of a repository group
    MergeGroupIndex(String),
    /// Clean temporary group indexes whose TTL elapsed
    PurgeTemporaryIndexes,
}

impl fmt::Display for IndexTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexTask::ScanRepository(id) => write!(f, "scan:{}", id),
            IndexTask::DownloadRemoteIndex(id) => write!(f, "remote-index:{}", id),
            IndexTask::MergeGroupIndex(id) => write!(f, "merge:{}", id),
            IndexTask::PurgeTemporaryIndexes => write!(f, "purge-temporary-indexes"),
        }
    }
}

/// Parse a cron expression (seconds resolution)
pub fn parse_schedule(expression: &str) -> Result<Schedule> {
    Schedule::from_str(expression).map_err(|e| IndexError::InvalidCron {
        expression: expression.to_string(),
        message: e.to_string(),
    })
}

/// Keeps a task in the running set until dropped
struct TaskGuard {
    scheduler: Arc<Scheduler>,
    task: IndexTask,
}

impl TaskGuard {
    fn acquire(scheduler: &Arc<Scheduler>, task: &IndexTask) -> Option<Self> {
        scheduler.running().insert(task.clone()).then(|| Self {
            scheduler: Arc::clone(scheduler),
            task: task.clone(),
        })
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.scheduler.running().remove(&self.task);
    }
}

/// Runs indexing tasks on their schedules and on demand
pub struct Scheduler {
    config: Arc<ArchivaConfig>,
    engine: Arc<IndexEngine>,
    merger: Arc<IndexMerger>,
    downloader: Arc<RemoteIndexDownloader>,
    running: Mutex<HashSet<IndexTask>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("running", &*self.running())
            .finish()
    }
}

impl Scheduler {
    pub fn new(
        config: Arc<ArchivaConfig>,
        engine: Arc<IndexEngine>,
        merger: Arc<IndexMerger>,
        downloader: Arc<RemoteIndexDownloader>,
    ) -> Self {
        Self {
            config,
            engine,
            merger,
            downloader,
            running: Mutex::new(HashSet::new()),
            handles: Mutex::new(Vec::new()),
        }
    }

    fn running(&self) -> MutexGuard<'_, HashSet<IndexTask>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the background loops of every valid schedule.
    ///
    /// Malformed cron expressions are logged and their schedule is not
    /// activated. Returns the number of loops started.
    pub fn start(self: &Arc<Self>) -> usize {
        let mut handles = Vec::new();

        for repository in &self.config.managed_repositories {
            handles.extend(self.spawn_schedule(
                IndexTask::ScanRepository(repository.id.clone()),
                &repository.indexing.cron_expression,
            ));
        }

        for remote in &self.config.remote_repositories {
            let Some(index) = &remote.remote_index else {
                continue;
            };
            let task = IndexTask::DownloadRemoteIndex(remote.id.clone());
            if index.download_on_startup {
                self.queue_task(task.clone());
            }
            handles.extend(self.spawn_schedule(task, &index.cron_expression));
        }

        for group in &self.config.repository_groups {
            if let Some(expression) = &group.cron_expression {
                handles.extend(
                    self.spawn_schedule(IndexTask::MergeGroupIndex(group.id.clone()), expression),
                );
            }
        }

        let sweep = self.config.settings.temporary_index_sweep;
        if sweep.is_zero() {
            tracing::warn!("Temporary index sweep interval is zero, sweep disabled");
        } else {
            let scheduler = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                let mut ticker = interval(sweep);
                // The first tick completes immediately
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    scheduler.queue_task(IndexTask::PurgeTemporaryIndexes);
                }
            }));
        }

        let started = handles.len();
        tracing::info!("Scheduler started with {} schedules", started);
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(handles);
        started
    }

    fn spawn_schedule(self: &Arc<Self>, task: IndexTask, expression: &str) -> Option<JoinHandle<()>> {
        let schedule = match parse_schedule(expression) {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::warn!("Not scheduling {}: {}", task, e);
                return None;
            }
        };

        tracing::debug!("Scheduling {} with '{}'", task, expression);
        let scheduler = Arc::clone(self);
        Some(tokio::spawn(async move {
            while let Some(next) = schedule.upcoming(Utc).next() {
                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;
                scheduler.queue_task(task.clone());
            }
        }))
    }

    /// Abort every background loop; running tasks finish on their own
    pub fn shutdown(&self) {
        let handles: Vec<_> = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in &handles {
            handle.abort();
        }
        tracing::debug!("Scheduler stopped {} schedules", handles.len());
    }

    /// Run `task` in the background unless it is already running.
    ///
    /// Returns `false` if the task was already running.
    pub fn queue_task(self: &Arc<Self>, task: IndexTask) -> bool {
        let Some(guard) = TaskGuard::acquire(self, &task) else {
            tracing::debug!("Task {} already running, not queued", task);
            return false;
        };

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = scheduler.run_task(&task).await {
                tracing::warn!("Task {} failed: {}", task, e);
            }
        });
        true
    }

    pub fn is_running(&self, task: &IndexTask) -> bool {
        self.running().contains(task)
    }

    /// Run `task` to completion on the current task
    pub async fn run_task(&self, task: &IndexTask) -> Result<()> {
        tracing::debug!("Running task {}", task);
        match task {
            IndexTask::ScanRepository(id) => {
                let repository = self.config.managed_repository(id)?.clone();
                let engine = Arc::clone(&self.engine);
                tokio::task::spawn_blocking(move || {
                    let index_dir = repository.index_directory();
                    let skip_packing = repository.indexing.skip_packed_index_creation;
                    let context = engine.get_or_add_indexing_context(
                        &repository.id,
                        &repository.id,
                        &index_dir,
                    )?;
                    let content = ManagedRepositoryContent::open(repository)?;
                    ArtifactScanner::new(&content).scan(&context)?;
                    context.optimize()?;
                    if !skip_packing {
                        IndexPacker::new().pack(&context, &index_dir)?;
                    }
                    Ok::<_, IndexError>(())
                })
                .await??;
            }
            IndexTask::DownloadRemoteIndex(id) => {
                let remote = self.config.remote_repository(id)?;
                self.downloader.download(remote).await?;
            }
            IndexTask::MergeGroupIndex(id) => {
                let request =
                    IndexMergerRequest::for_group(self.config.repository_group(id)?).with_pack(true);
                let merger = Arc::clone(&self.merger);
                tokio::task::spawn_blocking(move || merger.build_merged_index(&request))
                    .await??;
            }
            IndexTask::PurgeTemporaryIndexes => {
                let purged = self.merger.purge_expired_temporary_indexes();
                if purged > 0 {
                    tracing::info!("Purged {} expired temporary indexes", purged);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archiva_core::{ManagedRepository, RepositoryGroup};
    use archiva_proxy::{ConnectorRegistry, HttpTransport};
    use std::time::Duration;
    use tempfile::TempDir;

    fn scheduler(dir: &TempDir, config: ArchivaConfig) -> Arc<Scheduler> {
        let engine = Arc::new(IndexEngine::new());
        let merger = Arc::new(IndexMerger::new(Arc::clone(&engine), dir.path().join("work")));
        let downloader = Arc::new(RemoteIndexDownloader::new(
            Arc::new(HttpTransport::new()),
            Arc::new(ConnectorRegistry::new()),
            Arc::clone(&engine),
            dir.path().join("work"),
        ));
        Arc::new(Scheduler::new(Arc::new(config), engine, merger, downloader))
    }

    fn config_with_repository(dir: &TempDir) -> ArchivaConfig {
        let root = dir.path().join("internal");
        let jar = root.join("org/example/app/1.0/app-1.0.jar");
        std::fs::create_dir_all(jar.parent().unwrap()).unwrap();
        std::fs::write(&jar, b"jar").unwrap();

        let mut config = ArchivaConfig::default();
        config
            .managed_repositories
            .push(ManagedRepository::new("internal", root));
        config
    }

    #[test]
    fn test_parse_schedule() {
        assert!(parse_schedule("0 0,30 * * * *").is_ok());
        assert!(matches!(
            parse_schedule("every tuesday"),
            Err(IndexError::InvalidCron { .. })
        ));
    }

    #[test]
    fn test_task_display() {
        assert_eq!(IndexTask::ScanRepository("internal".into()).to_string(), "scan:internal");
        assert_eq!(IndexTask::MergeGroupIndex("public".into()).to_string(), "merge:public");
    }

    #[tokio::test]
    async fn test_queue_task_refuses_running_task() {
        let dir = TempDir::new().unwrap();
        let scheduler = scheduler(&dir, ArchivaConfig::default());
        let task = IndexTask::PurgeTemporaryIndexes;

        let guard = TaskGuard::acquire(&scheduler, &task).unwrap();
        assert!(scheduler.is_running(&task));
        assert!(!scheduler.queue_task(task.clone()));

        drop(guard);
        assert!(!scheduler.is_running(&task));
        assert!(scheduler.queue_task(task));
    }

    #[tokio::test]
    async fn test_malformed_cron_is_not_activated() {
        let dir = TempDir::new().unwrap();
        let mut config = config_with_repository(&dir);
        config.managed_repositories[0].indexing.cron_expression = "not a cron".to_string();
        let mut group = RepositoryGroup::new("public", vec!["internal".into()]);
        group.cron_expression = Some("0 0 * * * *".to_string());
        config.repository_groups.push(group);

        let scheduler = scheduler(&dir, config);
        // Group merge plus the temporary index sweep
        assert_eq!(scheduler.start(), 2);
        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_scan_then_merge() {
        let dir = TempDir::new().unwrap();
        let mut config = config_with_repository(&dir);
        let mut group = RepositoryGroup::new("public", vec!["internal".into()]);
        group.location = Some(dir.path().join("groups/public"));
        config.repository_groups.push(group);
        let scheduler = scheduler(&dir, config);

        scheduler
            .run_task(&IndexTask::ScanRepository("internal".into()))
            .await
            .unwrap();
        let context = scheduler.engine.indexing_context("internal").unwrap();
        assert_eq!(context.artifact_count().unwrap(), 1);
        assert!(
            dir.path()
                .join("internal/.indexer")
                .join(crate::packer::PACKED_INDEX_FILE)
                .is_file()
        );

        scheduler
            .run_task(&IndexTask::MergeGroupIndex("public".into()))
            .await
            .unwrap();
        let merged = scheduler.engine.indexing_context("public-merged").unwrap();
        assert_eq!(merged.artifact_count().unwrap(), 1);
        assert!(
            dir.path()
                .join("groups/public/.indexer")
                .join(crate::packer::PACKED_INDEX_FILE)
                .is_file()
        );
    }

    #[tokio::test]
    async fn test_unknown_repository_fails() {
        let dir = TempDir::new().unwrap();
        let scheduler = scheduler(&dir, ArchivaConfig::default());
        let err = scheduler
            .run_task(&IndexTask::ScanRepository("missing".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Core(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_purges_expired_indexes() {
        let dir = TempDir::new().unwrap();
        let mut config = ArchivaConfig::default();
        config.settings.temporary_index_sweep = Duration::from_secs(60);
        let scheduler = scheduler(&dir, config);

        scheduler
            .merger
            .build_merged_index(
                &IndexMergerRequest::new("public", Vec::new()).temporary(Duration::ZERO),
            )
            .unwrap();
        assert_eq!(scheduler.merger.temporary_group_indexes().len(), 1);

        scheduler.start();
        tokio::time::sleep(Duration::from_secs(61)).await;
        // Let the queued purge run
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(scheduler.merger.temporary_group_indexes().is_empty());
        scheduler.shutdown();
    }
}
