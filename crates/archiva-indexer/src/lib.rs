//! Archiva repository indexing
//!
//! - **Indexing contexts**: SQLite databases with full-text search over
//!   artifact coordinates, one per repository
//! - **Scanner**: brings a repository's context in line with its content
//! - **Packer**: `archiva-index.tar.gz` archives for download by clients
//! - **Merger**: group indexes merged from member contexts, optionally
//!   temporary with a TTL
//! - **Remote indexes**: download of indexes published by remotes
//! - **Scheduler**: cron-driven and on-demand execution of all of the above

pub mod context;
pub mod engine;
pub mod error;
pub mod merger;
pub mod packer;
pub mod remote;
pub mod scanner;
pub mod scheduler;

// Re-exports for convenience
pub use context::{ArtifactRecord, IndexingContext};
pub use engine::IndexEngine;
pub use error::{IndexError, Result};
pub use merger::{IndexMerger, IndexMergerRequest, TemporaryGroupIndex};
pub use packer::{IndexPacker, IndexProperties, PackedIndex};
pub use remote::{RemoteIndexDownloader, RemoteIndexUpdate};
pub use scanner::{ArtifactScanner, ScanStatistics};
pub use scheduler::{IndexTask, Scheduler, parse_schedule};
