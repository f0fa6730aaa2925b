//! SHA-256 digest of the finished archive.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

/// Digest record written next to the invoking process.
pub const DIGEST_FILE_NAME: &str = "checksum.sha256";

/// A digest that has been written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestRecord {
    /// Lowercase hex SHA-256 of the archive.
    pub hex: String,
    /// Absolute path of the record file.
    pub path: PathBuf,
}

/// Stream `path` through SHA-256 and return the lowercase hex digest.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let bytes = io::copy(&mut file, &mut hasher).with_context(|| format!("read {}", path.display()))?;
    debug!(path = %path.display(), bytes, "hashed file");
    Ok(hex::encode(hasher.finalize()))
}

/// Hash `archive_path` and write `<hex>\n` to [`DIGEST_FILE_NAME`] in `dir`,
/// replacing any previous record.
#[instrument(skip_all, fields(archive = %archive_path.display()))]
pub fn record_digest(archive_path: &Path, dir: &Path) -> Result<DigestRecord> {
    let hex = sha256_file(archive_path)?;
    let path = std::path::absolute(dir.join(DIGEST_FILE_NAME))
        .with_context(|| format!("resolve {}", dir.display()))?;
    fs::write(&path, format!("{hex}\n")).with_context(|| format!("write {}", path.display()))?;
    debug!(path = %path.display(), digest = %hex, "digest recorded");
    Ok(DigestRecord { hex, path })
}
