//! Packed, downloadable indexes
//!
//! A packed index is `archiva-index.tar.gz` holding a consistent copy of the
//! context database and an `archiva-index.properties` descriptor. The
//! descriptor is also written next to the archive so clients can check the
//! timestamp without downloading the archive.

use chrono::{DateTime, SecondsFormat, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, Header};

use crate::context::{DATABASE_FILE, IndexingContext, remove_database_files};
use crate::error::{IndexError, Result};

/// File name of the packed index archive
pub const PACKED_INDEX_FILE: &str = "archiva-index.tar.gz";

/// File name of the index descriptor
pub const PROPERTIES_FILE: &str = "archiva-index.properties";

const KEY_ID: &str = "archiva.index.id";
const KEY_REPOSITORY: &str = "archiva.index.repository";
const KEY_TIMESTAMP: &str = "archiva.index.timestamp";
const KEY_ARTIFACTS: &str = "archiva.index.artifacts";

/// Descriptor of a packed index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexProperties {
    pub id: String,
    pub repository_id: String,
    pub timestamp: DateTime<Utc>,
    pub artifact_count: usize,
}

impl IndexProperties {
    /// Parse `key=value` lines; `#` starts a comment
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let values: HashMap<&str, &str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(|l| l.split_once('='))
            .map(|(k, v)| (k.trim(), v.trim()))
            .collect();

        let get = |key: &str| {
            values
                .get(key)
                .copied()
                .ok_or_else(|| format!("missing property {}", key))
        };

        let timestamp = DateTime::parse_from_rfc3339(get(KEY_TIMESTAMP)?)
            .map_err(|e| format!("invalid {}: {}", KEY_TIMESTAMP, e))?
            .with_timezone(&Utc);
        let artifact_count = get(KEY_ARTIFACTS)?
            .parse()
            .map_err(|e| format!("invalid {}: {}", KEY_ARTIFACTS, e))?;

        Ok(Self {
            id: get(KEY_ID)?.to_string(),
            repository_id: get(KEY_REPOSITORY)?.to_string(),
            timestamp,
            artifact_count,
        })
    }
}

impl fmt::Display for IndexProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#Archiva index properties")?;
        writeln!(f, "{}={}", KEY_ID, self.id)?;
        writeln!(f, "{}={}", KEY_REPOSITORY, self.repository_id)?;
        writeln!(
            f,
            "{}={}",
            KEY_TIMESTAMP,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
        )?;
        writeln!(f, "{}={}", KEY_ARTIFACTS, self.artifact_count)
    }
}

/// Files written by [`IndexPacker::pack`]
#[derive(Debug, Clone)]
pub struct PackedIndex {
    pub archive: PathBuf,
    pub properties_file: PathBuf,
    pub properties: IndexProperties,
}

/// Creates and extracts packed indexes
#[derive(Debug, Clone, Copy)]
pub struct IndexPacker {
    compression: Compression,
}

impl Default for IndexPacker {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
        }
    }
}

impl IndexPacker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression = Compression::new(level);
        self
    }

    /// Pack `context` into `target_dir`, replacing a previous packed index
    pub fn pack(&self, context: &IndexingContext, target_dir: &Path) -> Result<PackedIndex> {
        std::fs::create_dir_all(target_dir)?;
        let staging = tempfile::Builder::new()
            .prefix(".archiva-pack-")
            .tempdir_in(target_dir)?;

        let database = staging.path().join(DATABASE_FILE);
        context.export_to(&database)?;

        let properties = IndexProperties {
            id: context.id().to_string(),
            repository_id: context.repository_id().to_string(),
            // Millisecond precision, as written to the descriptor
            timestamp: DateTime::from_timestamp_millis(Utc::now().timestamp_millis())
                .unwrap_or_else(Utc::now),
            artifact_count: context.artifact_count()?,
        };
        let properties_text = properties.to_string();

        let staged_archive = staging.path().join(PACKED_INDEX_FILE);
        let file = File::create(&staged_archive)?;
        let encoder = GzEncoder::new(file, self.compression);
        let mut builder = Builder::new(encoder);
        add_bytes_to_archive(&mut builder, PROPERTIES_FILE, properties_text.as_bytes())?;
        add_file_to_archive(&mut builder, &database, DATABASE_FILE)?;
        let encoder = builder.into_inner()?;
        encoder.finish()?;

        let archive = target_dir.join(PACKED_INDEX_FILE);
        std::fs::rename(&staged_archive, &archive)?;
        let properties_file = target_dir.join(PROPERTIES_FILE);
        std::fs::write(&properties_file, &properties_text)?;

        tracing::debug!(
            "Packed index {} ({} artifacts) into {}",
            properties.id,
            properties.artifact_count,
            archive.display()
        );
        Ok(PackedIndex {
            archive,
            properties_file,
            properties,
        })
    }

    /// Extract a packed index into `directory`, replacing its database.
    ///
    /// Any context open on `directory` must be reopened afterwards.
    pub fn unpack(&self, archive_path: &Path, directory: &Path) -> Result<IndexProperties> {
        let invalid = |message: String| IndexError::Archive {
            path: archive_path.display().to_string(),
            message,
        };

        let mut files = read_all_files_from_archive(archive_path)?;
        let database = files
            .remove(DATABASE_FILE)
            .ok_or_else(|| invalid(format!("missing {}", DATABASE_FILE)))?;
        let properties_text = files
            .remove(PROPERTIES_FILE)
            .ok_or_else(|| invalid(format!("missing {}", PROPERTIES_FILE)))?;
        let properties_text = String::from_utf8(properties_text)
            .map_err(|e| invalid(format!("invalid UTF-8 in {}: {}", PROPERTIES_FILE, e)))?;
        let properties = IndexProperties::parse(&properties_text).map_err(invalid)?;

        std::fs::create_dir_all(directory)?;
        let staged = directory.join(format!(".{}.unpacking", DATABASE_FILE));
        std::fs::write(&staged, &database)?;
        remove_database_files(directory)?;
        std::fs::rename(&staged, directory.join(DATABASE_FILE))?;
        std::fs::write(directory.join(PROPERTIES_FILE), &properties_text)?;

        Ok(properties)
    }
}

/// Read the descriptor written next to a packed index
pub fn read_properties(directory: &Path) -> Result<Option<IndexProperties>> {
    let path = directory.join(PROPERTIES_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)?;
    IndexProperties::parse(&text)
        .map(Some)
        .map_err(|message| IndexError::Archive {
            path: path.display().to_string(),
            message,
        })
}

fn read_all_files_from_archive(archive_path: &Path) -> Result<HashMap<String, Vec<u8>>> {
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let mut contents = HashMap::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path()?.to_string_lossy().to_string();
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        contents.insert(path, data);
    }

    Ok(contents)
}

fn add_file_to_archive<W: Write>(
    builder: &mut Builder<W>,
    file_path: &Path,
    archive_path: &str,
) -> Result<()> {
    let content = std::fs::read(file_path)?;
    add_bytes_to_archive(builder, archive_path, &content)
}

fn add_bytes_to_archive<W: Write>(
    builder: &mut Builder<W>,
    archive_path: &str,
    content: &[u8],
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(Utc::now().timestamp().max(0) as u64);
    header.set_cksum();

    builder.append_data(&mut header, archive_path, content)?;
    Ok(())
}
