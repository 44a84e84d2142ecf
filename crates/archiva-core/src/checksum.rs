//! Checksum files next to repository content
//!
//! A file `foo.jar` may be accompanied by `foo.jar.sha1`, `foo.jar.md5` and
//! `foo.jar.sha256`. Checksum files are written as `<hex>  <filename>` and
//! parsed leniently, since remote repositories publish several formats.

use md5::Md5;
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Sha1,
    Md5,
    Sha256,
}

impl ChecksumAlgorithm {
    /// Algorithms fetched and maintained next to proxied content
    pub const PROXIED: [ChecksumAlgorithm; 2] = [ChecksumAlgorithm::Sha1, ChecksumAlgorithm::Md5];

    /// Checksum file extension (without the dot)
    pub fn extension(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha1 => "sha1",
            ChecksumAlgorithm::Md5 => "md5",
            ChecksumAlgorithm::Sha256 => "sha256",
        }
    }

    /// Length of the hex encoded digest
    pub fn hex_len(&self) -> usize {
        match self {
            ChecksumAlgorithm::Sha1 => 40,
            ChecksumAlgorithm::Md5 => 32,
            ChecksumAlgorithm::Sha256 => 64,
        }
    }

    /// Algorithm for a checksum file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "sha1" => Some(ChecksumAlgorithm::Sha1),
            "md5" => Some(ChecksumAlgorithm::Md5),
            "sha256" => Some(ChecksumAlgorithm::Sha256),
            _ => None,
        }
    }

    fn bsd_name(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha1 => "SHA1",
            ChecksumAlgorithm::Md5 => "MD5",
            ChecksumAlgorithm::Sha256 => "SHA256",
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.bsd_name())
    }
}

enum Hasher {
    Sha1(Sha1),
    Md5(Md5),
    Sha256(Sha256),
}

impl Hasher {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Sha1 => Hasher::Sha1(Sha1::new()),
            ChecksumAlgorithm::Md5 => Hasher::Md5(Md5::new()),
            ChecksumAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha1(h) => h.update(data),
            Hasher::Md5(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Hasher::Sha1(h) => hex::encode(h.finalize()),
            Hasher::Md5(h) => hex::encode(h.finalize()),
            Hasher::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Hex digest of in-memory data
pub fn digest_hex(algorithm: ChecksumAlgorithm, data: &[u8]) -> String {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    hasher.finalize_hex()
}

/// A file together with its checksum siblings
#[derive(Debug, Clone)]
pub struct ChecksummedFile {
    path: PathBuf,
}

impl ChecksummedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the checksum file for an algorithm
    pub fn checksum_path(&self, algorithm: ChecksumAlgorithm) -> PathBuf {
        checksum_path_for(&self.path, algorithm)
    }

    /// Compute the digest of the file
    pub fn calculate(&self, algorithm: ChecksumAlgorithm) -> Result<String> {
        let mut digests = self.calculate_all(&[algorithm])?;
        Ok(digests.remove(0).1)
    }

    /// Compute several digests in a single pass over the file
    pub fn calculate_all(
        &self,
        algorithms: &[ChecksumAlgorithm],
    ) -> Result<Vec<(ChecksumAlgorithm, String)>> {
        let mut hashers: Vec<(ChecksumAlgorithm, Hasher)> = algorithms
            .iter()
            .map(|a| (*a, Hasher::new(*a)))
            .collect();

        let mut file = File::open(&self.path)?;
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            for (_, hasher) in hashers.iter_mut() {
                hasher.update(&buf[..n]);
            }
        }

        Ok(hashers
            .into_iter()
            .map(|(a, h)| (a, h.finalize_hex()))
            .collect())
    }

    /// Check the file against its checksum files.
    ///
    /// Returns `false` when none of the requested checksum files exist, or
    /// when any existing one disagrees with the content.
    pub fn is_valid_checksums(&self, algorithms: &[ChecksumAlgorithm]) -> Result<bool> {
        let present: Vec<ChecksumAlgorithm> = algorithms
            .iter()
            .copied()
            .filter(|a| self.checksum_path(*a).is_file())
            .collect();

        if present.is_empty() {
            return Ok(false);
        }

        let filename = self.file_name();
        for (algorithm, actual) in self.calculate_all(&present)? {
            let raw = std::fs::read_to_string(self.checksum_path(algorithm))?;
            match parse_checksum(&raw, algorithm, &filename) {
                Ok(expected) if expected.eq_ignore_ascii_case(&actual) => {}
                Ok(expected) => {
                    tracing::debug!(
                        "{} mismatch for {}: expected {}, actual {}",
                        algorithm,
                        self.path.display(),
                        expected,
                        actual
                    );
                    return Ok(false);
                }
                Err(e) => {
                    tracing::debug!("Unreadable {} checksum: {}", algorithm, e);
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }

    /// Rewrite any missing or wrong checksum files to match the content
    pub fn fix_checksums(&self, algorithms: &[ChecksumAlgorithm]) -> Result<()> {
        let filename = self.file_name();
        for (algorithm, actual) in self.calculate_all(algorithms)? {
            let checksum_path = self.checksum_path(algorithm);
            let current = std::fs::read_to_string(&checksum_path)
                .ok()
                .and_then(|raw| parse_checksum(&raw, algorithm, &filename).ok());
            if current.is_some_and(|c| c.eq_ignore_ascii_case(&actual)) {
                continue;
            }
            std::fs::write(&checksum_path, format!("{}  {}", actual, filename))?;
        }
        Ok(())
    }

    /// Delete the file's checksum siblings
    pub fn remove_checksums(&self) -> Result<()> {
        for algorithm in [
            ChecksumAlgorithm::Sha1,
            ChecksumAlgorithm::Md5,
            ChecksumAlgorithm::Sha256,
        ] {
            let path = self.checksum_path(algorithm);
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Path of the checksum sibling of `path`
pub fn checksum_path_for(path: &Path, algorithm: ChecksumAlgorithm) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(algorithm.extension());
    PathBuf::from(name)
}

/// Extract the hex digest from checksum file content.
///
/// Accepts a bare digest, `<digest>  <filename>`, `<digest> *<filename>` and
/// the BSD form `SHA1 (<filename>) = <digest>`.
pub fn parse_checksum(raw: &str, algorithm: ChecksumAlgorithm, filename: &str) -> Result<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let invalid = |message: &str| CoreError::Checksum {
        path: filename.to_string(),
        message: message.to_string(),
    };

    let digest = if let Some((head, tail)) = line.split_once(" = ") {
        let (name, _) = head
            .split_once(" (")
            .ok_or_else(|| invalid("malformed checksum line"))?;
        if !name.replace('-', "").eq_ignore_ascii_case(algorithm.bsd_name()) {
            return Err(invalid("checksum algorithm does not match"));
        }
        tail.trim()
    } else {
        let mut parts = line.split_whitespace();
        let digest = parts.next().unwrap_or("");
        if let Some(named) = parts.next() {
            let named = named.trim_start_matches('*');
            let named = named.rsplit('/').next().unwrap_or(named);
            if !filename.is_empty() && named != filename {
                return Err(invalid("checksum refers to a different file"));
            }
        }
        digest
    };

    if digest.len() != algorithm.hex_len() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid("not a valid digest"));
    }

    Ok(digest.to_ascii_lowercase())
}
