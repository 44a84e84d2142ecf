//! SQLite-based indexing context with FTS5 search over artifact coordinates
//!
//! One context indexes the artifacts of one repository, or of a whole
//! repository group once contexts are merged. The database lives in a single
//! file inside the context directory so it can be packed and shipped.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, Row, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use archiva_core::ArtifactReference;

use crate::error::Result;

/// File name of the context database inside its directory
pub const DATABASE_FILE: &str = "archiva-index.db";

const SEARCH_LIMIT: usize = 100;

/// One indexed artifact file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
    /// Repository the artifact was indexed from
    pub repository_id: String,
    pub sha1: Option<String>,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ArtifactRecord {
    pub fn new(reference: &ArtifactReference, repository_id: impl Into<String>) -> Self {
        Self {
            group_id: reference.group_id.clone(),
            artifact_id: reference.artifact_id.clone(),
            version: reference.version.clone(),
            classifier: reference.classifier.clone(),
            extension: reference.r#type.clone(),
            repository_id: repository_id.into(),
            sha1: None,
            size: 0,
            last_modified: None,
        }
    }

    pub fn reference(&self) -> ArtifactReference {
        let reference = ArtifactReference::new(
            &self.group_id,
            &self.artifact_id,
            &self.version,
            &self.extension,
        );
        match &self.classifier {
            Some(classifier) => reference.with_classifier(classifier),
            None => reference,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let classifier: String = row.get(3)?;
        Ok(Self {
            group_id: row.get(0)?,
            artifact_id: row.get(1)?,
            version: row.get(2)?,
            classifier: (!classifier.is_empty()).then_some(classifier),
            extension: row.get(4)?,
            repository_id: row.get(5)?,
            sha1: row.get(6)?,
            size: row.get::<_, i64>(7)?.max(0) as u64,
            last_modified: row
                .get::<_, Option<i64>>(8)?
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
        })
    }
}

/// An on-disk search index
pub struct IndexingContext {
    id: String,
    repository_id: String,
    directory: PathBuf,
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for IndexingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexingContext")
            .field("id", &self.id)
            .field("repository_id", &self.repository_id)
            .field("directory", &self.directory)
            .finish()
    }
}

impl IndexingContext {
    /// Open or create the context stored in `directory`
    pub fn open(
        id: impl Into<String>,
        repository_id: impl Into<String>,
        directory: impl Into<PathBuf>,
    ) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        let path = directory.join(DATABASE_FILE);

        let conn = match Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .and_then(|conn| Self::init(&conn).map(|_| conn))
        {
            Ok(conn) => conn,
            Err(e) => {
                // An index can always be rebuilt by scanning
                tracing::warn!("Index at {} corrupted, recreating: {}", path.display(), e);
                remove_database_files(&directory)?;
                let conn = Connection::open(&path)?;
                Self::init(&conn)?;
                conn
            }
        };

        Ok(Self {
            id: id.into(),
            repository_id: repository_id.into(),
            directory,
            conn: Mutex::new(conn),
        })
    }

    /// Open a context that lives in memory only, such as a merge staging area
    pub fn open_memory(id: impl Into<String>, repository_id: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            id: id.into(),
            repository_id: repository_id.into(),
            directory: PathBuf::new(),
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> rusqlite::Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS artifacts (
                id INTEGER PRIMARY KEY,
                group_id TEXT NOT NULL,
                artifact_id TEXT NOT NULL,
                version TEXT NOT NULL,
                classifier TEXT NOT NULL DEFAULT '',
                extension TEXT NOT NULL,
                repository_id TEXT NOT NULL,
                sha1 TEXT,
                size INTEGER NOT NULL DEFAULT 0,
                last_modified INTEGER,
                UNIQUE(group_id, artifact_id, version, classifier, extension)
            );

            CREATE VIRTUAL TABLE IF NOT EXISTS artifacts_fts USING fts5(
                group_id,
                artifact_id,
                version,
                classifier,
                content='artifacts',
                content_rowid='id'
            );

            CREATE TRIGGER IF NOT EXISTS artifacts_ai AFTER INSERT ON artifacts BEGIN
                INSERT INTO artifacts_fts(rowid, group_id, artifact_id, version, classifier)
                VALUES (new.id, new.group_id, new.artifact_id, new.version, new.classifier);
            END;

            CREATE TRIGGER IF NOT EXISTS artifacts_ad AFTER DELETE ON artifacts BEGIN
                INSERT INTO artifacts_fts(artifacts_fts, rowid, group_id, artifact_id, version, classifier)
                VALUES ('delete', old.id, old.group_id, old.artifact_id, old.version, old.classifier);
            END;

            CREATE TRIGGER IF NOT EXISTS artifacts_au AFTER UPDATE ON artifacts BEGIN
                INSERT INTO artifacts_fts(artifacts_fts, rowid, group_id, artifact_id, version, classifier)
                VALUES ('delete', old.id, old.group_id, old.artifact_id, old.version, old.classifier);
                INSERT INTO artifacts_fts(rowid, group_id, artifact_id, version, classifier)
                VALUES (new.id, new.group_id, new.artifact_id, new.version, new.classifier);
            END;

            CREATE INDEX IF NOT EXISTS idx_artifacts_ga ON artifacts(group_id, artifact_id);
            CREATE INDEX IF NOT EXISTS idx_artifacts_repo ON artifacts(repository_id);

            CREATE TABLE IF NOT EXISTS context_info (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the connection cannot leave SQLite inconsistent
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or update one artifact
    pub fn add(&self, record: &ArtifactRecord) -> Result<()> {
        self.add_all(std::slice::from_ref(record))
    }

    /// Add or update artifacts in one transaction
    pub fn add_all(&self, records: &[ArtifactRecord]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        insert_records(&tx, records)?;
        touch(&tx)?;
        tx.commit()?;
        Ok(())
    }

    /// Replace the whole content with `records` in one transaction.
    ///
    /// Searches see either the previous content or the new one.
    pub fn replace_all(&self, records: &[ArtifactRecord]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM artifacts", [])?;
        insert_records(&tx, records)?;
        touch(&tx)?;
        tx.commit()?;
        Ok(())
    }

    /// Remove one artifact file; returns whether it was indexed
    pub fn remove(&self, record: &ArtifactRecord) -> Result<bool> {
        let conn = self.conn();
        let removed = conn.execute(
            r#"
            DELETE FROM artifacts
            WHERE group_id = ?1 AND artifact_id = ?2 AND version = ?3
              AND classifier = ?4 AND extension = ?5
            "#,
            params![
                record.group_id,
                record.artifact_id,
                record.version,
                record.classifier.as_deref().unwrap_or(""),
                record.extension,
            ],
        )?;
        if removed > 0 {
            touch(&conn)?;
        }
        Ok(removed > 0)
    }

    /// Remove every file of one version
    pub fn remove_version(&self, group_id: &str, artifact_id: &str, version: &str) -> Result<usize> {
        let conn = self.conn();
        let removed = conn.execute(
            "DELETE FROM artifacts WHERE group_id = ?1 AND artifact_id = ?2 AND version = ?3",
            params![group_id, artifact_id, version],
        )?;
        if removed > 0 {
            touch(&conn)?;
        }
        Ok(removed)
    }

    /// Full-text search over coordinates.
    ///
    /// Each whitespace separated term must match; `org.example` matches the
    /// group id `org.example` but also `org.example.tools`.
    pub fn search(&self, query: &str) -> Result<Vec<ArtifactRecord>> {
        let Some(fts_query) = fts_query(query) else {
            return Ok(Vec::new());
        };

        let conn = self.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT a.group_id, a.artifact_id, a.version, a.classifier, a.extension,
                   a.repository_id, a.sha1, a.size, a.last_modified
            FROM artifacts_fts fts
            JOIN artifacts a ON a.id = fts.rowid
            WHERE artifacts_fts MATCH ?1
            ORDER BY bm25(artifacts_fts), a.group_id, a.artifact_id, a.version
            LIMIT ?2
            "#,
        )?;

        let records = stmt
            .query_map(params![fts_query, SEARCH_LIMIT as i64], ArtifactRecord::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Every indexed artifact, ordered by coordinates
    pub fn records(&self) -> Result<Vec<ArtifactRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT group_id, artifact_id, version, classifier, extension,
                   repository_id, sha1, size, last_modified
            FROM artifacts
            ORDER BY group_id, artifact_id, version, classifier, extension
            "#,
        )?;
        let records = stmt
            .query_map([], ArtifactRecord::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Copy every artifact of `other` into this context.
    ///
    /// Entries already present are updated. Returns the number merged.
    pub fn merge_from(&self, other: &IndexingContext) -> Result<usize> {
        let records = other.records()?;
        self.add_all(&records)?;
        tracing::debug!(
            "Merged {} artifacts from {} into {}",
            records.len(),
            other.id,
            self.id
        );
        Ok(records.len())
    }

    /// Remove every artifact
    pub fn clear(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM artifacts", [])?;
        touch(&conn)?;
        Ok(())
    }

    /// Compact the full-text index and fold the write-ahead log into the database
    pub fn optimize(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch("INSERT INTO artifacts_fts(artifacts_fts) VALUES('optimize');")?;
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }

    /// Write a consistent single-file copy of the database to `path`
    pub fn export_to(&self, path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let conn = self.conn();
        conn.execute("VACUUM INTO ?1", [path.to_string_lossy()])?;
        Ok(())
    }

    pub fn artifact_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM artifacts", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    /// When the content last changed
    pub fn last_updated(&self) -> Result<Option<DateTime<Utc>>> {
        let value: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM context_info WHERE key = 'last_updated'",
                [],
                |r| r.get(0),
            )
            .ok();
        Ok(value
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|ts| DateTime::from_timestamp(ts, 0)))
    }
}

/// Upsert records keyed by their coordinates
fn insert_records(conn: &Connection, records: &[ArtifactRecord]) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO artifacts (group_id, artifact_id, version, classifier, extension,
                               repository_id, sha1, size, last_modified)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(group_id, artifact_id, version, classifier, extension) DO UPDATE SET
            repository_id = excluded.repository_id,
            sha1 = excluded.sha1,
            size = excluded.size,
            last_modified = excluded.last_modified
        "#,
    )?;
    for record in records {
        stmt.execute(params![
            record.group_id,
            record.artifact_id,
            record.version,
            record.classifier.as_deref().unwrap_or(""),
            record.extension,
            record.repository_id,
            record.sha1,
            record.size as i64,
            record.last_modified.map(|d| d.timestamp()),
        ])?;
    }
    Ok(())
}

fn touch(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO context_info (key, value) VALUES ('last_updated', ?1)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
        [Utc::now().timestamp().to_string()],
    )?;
    Ok(())
}

/// Delete the database of a context directory, including WAL side files
pub(crate) fn remove_database_files(directory: &Path) -> std::io::Result<()> {
    for suffix in ["", "-wal", "-shm"] {
        let path = directory.join(format!("{}{}", DATABASE_FILE, suffix));
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Quote each term so punctuation in coordinates is not read as FTS syntax
fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect();
    (!terms.is_empty()).then(|| terms.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(coordinates: &str, repository: &str) -> ArtifactRecord {
        let reference: ArtifactReference = coordinates.parse().unwrap();
        let mut record = ArtifactRecord::new(&reference, repository);
        record.size = 42;
        record
    }

    fn sample_context() -> IndexingContext {
        let context = IndexingContext::open_memory("internal", "internal").unwrap();
        context
            .add_all(&[
                record("org.apache.commons:commons-lang3:3.14.0:jar", "internal"),
                record("org.apache.commons:commons-io:2.15.0:jar", "internal"),
                record("com.example:widget:1.0:sources:jar", "internal"),
            ])
            .unwrap();
        context
    }

    #[test]
    fn test_context_init() {
        let context = IndexingContext::open_memory("empty", "empty").unwrap();
        assert_eq!(context.artifact_count().unwrap(), 0);
        assert!(context.last_updated().unwrap().is_none());
    }

    #[test]
    fn test_replace_all() {
        let context = sample_context();
        context
            .replace_all(&[record("org.example:app:2.0:jar", "snapshots")])
            .unwrap();

        assert_eq!(context.artifact_count().unwrap(), 1);
        assert!(context.search("commons").unwrap().is_empty());
        let found = context.search("app").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].repository_id, "snapshots");
    }

    #[test]
    fn test_add_is_upsert() {
        let context = sample_context();
        let mut updated = record("org.apache.commons:commons-io:2.15.0:jar", "internal");
        updated.sha1 = Some("abc".to_string());
        context.add(&updated).unwrap();

        assert_eq!(context.artifact_count().unwrap(), 3);
        let found = context.search("commons-io").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].sha1.as_deref(), Some("abc"));
        assert!(context.last_updated().unwrap().is_some());
    }

    #[test]
    fn test_search() {
        let context = sample_context();

        let results = context.search("org.apache.commons").unwrap();
        assert_eq!(results.len(), 2);

        let results = context.search("widget").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].classifier.as_deref(), Some("sources"));
        assert_eq!(results[0].reference().to_string(), "com.example:widget:1.0:sources:jar");

        // Terms are combined
        let results = context.search("commons lang3").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].artifact_id, "commons-lang3");

        assert!(context.search("   ").unwrap().is_empty());
        assert!(context.search("nothing-like-this").unwrap().is_empty());
    }

    #[test]
    fn test_search_quotes_terms() {
        let context = sample_context();
        // Bare FTS5 syntax would reject these
        assert!(context.search("\"unbalanced").unwrap().is_empty());
        assert!(context.search("a:b OR").unwrap().is_empty());
    }

    #[test]
    fn test_remove() {
        let context = sample_context();
        assert!(context.remove(&record("com.example:widget:1.0:sources:jar", "internal")).unwrap());
        assert!(!context.remove(&record("com.example:widget:1.0:sources:jar", "internal")).unwrap());
        assert!(context.search("widget").unwrap().is_empty());

        assert_eq!(
            context
                .remove_version("org.apache.commons", "commons-io", "2.15.0")
                .unwrap(),
            1
        );
        assert_eq!(context.artifact_count().unwrap(), 1);
    }

    #[test]
    fn test_merge_from() {
        let merged = IndexingContext::open_memory("group", "group").unwrap();
        let other = IndexingContext::open_memory("snapshots", "snapshots").unwrap();
        other
            .add(&record("org.example:app:1.0-SNAPSHOT:jar", "snapshots"))
            .unwrap();

        assert_eq!(merged.merge_from(&sample_context()).unwrap(), 3);
        assert_eq!(merged.merge_from(&other).unwrap(), 1);
        // Merging again updates rather than duplicates
        assert_eq!(merged.merge_from(&other).unwrap(), 1);

        assert_eq!(merged.artifact_count().unwrap(), 4);
        let app = merged.search("app").unwrap();
        assert_eq!(app[0].repository_id, "snapshots");
    }

    #[test]
    fn test_clear_and_optimize() {
        let context = sample_context();
        context.optimize().unwrap();
        context.clear().unwrap();
        assert_eq!(context.artifact_count().unwrap(), 0);
        assert!(context.search("commons").unwrap().is_empty());
    }

    #[test]
    fn test_persistent_context_reopens() {
        let dir = TempDir::new().unwrap();
        {
            let context = IndexingContext::open("internal", "internal", dir.path()).unwrap();
            context
                .add(&record("org.example:app:1.0:jar", "internal"))
                .unwrap();
        }
        let context = IndexingContext::open("internal", "internal", dir.path()).unwrap();
        assert_eq!(context.artifact_count().unwrap(), 1);
        assert_eq!(context.directory(), dir.path());
    }

    #[test]
    fn test_corrupted_database_is_recreated() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(DATABASE_FILE), b"this is not sqlite").unwrap();

        let context = IndexingContext::open("internal", "internal", dir.path()).unwrap();
        assert_eq!(context.artifact_count().unwrap(), 0);
    }

    #[test]
    fn test_export_to() {
        let dir = TempDir::new().unwrap();
        let context = sample_context();
        let copy = dir.path().join("copy").join(DATABASE_FILE);
        std::fs::create_dir_all(copy.parent().unwrap()).unwrap();
        context.export_to(&copy).unwrap();

        let reopened =
            IndexingContext::open("copy", "internal", copy.parent().unwrap()).unwrap();
        assert_eq!(reopened.artifact_count().unwrap(), 3);
    }
}
