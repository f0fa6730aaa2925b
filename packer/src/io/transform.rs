//! Mirror a source tree into an output tree, minifying JSON on the way.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};
use walkdir::{DirEntry, WalkDir};

use crate::core::classify::{FileKind, classify, is_excluded};
use crate::core::minify::minify_json;

/// A JSON file that failed to parse and was left out of the output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// Path relative to the source root.
    pub path: PathBuf,
    /// Parser message.
    pub reason: String,
}

/// Counters gathered while mirroring a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub minified: usize,
    pub copied: usize,
    pub bytes_read: u64,
    pub bytes_written: u64,
    /// Symlinks and other non-regular entries that were not copied.
    pub ignored: usize,
    pub skipped: Vec<SkippedFile>,
}

impl TransformReport {
    pub fn files_written(&self) -> usize {
        self.minified + self.copied
    }
}

/// Reproduce `source_root` under `output_root`.
///
/// `.json` files are minified, everything else is copied byte-for-byte, and
/// entries named in [`crate::core::classify::EXCLUDED_NAMES`] are pruned
/// before descent. `artifacts` names files the run itself produces (the
/// archive, the digest record); when they sit inside the source tree they are
/// pruned too, like an output root nested in the source. Malformed JSON is
/// recorded in the report and skipped; every other failure aborts the walk.
#[instrument(skip_all, fields(source = %source_root.display(), output = %output_root.display()))]
pub fn transform_tree(
    source_root: &Path,
    output_root: &Path,
    artifacts: &[PathBuf],
) -> Result<TransformReport> {
    fs::create_dir_all(output_root)
        .with_context(|| format!("create output dir {}", output_root.display()))?;
    let source_root = source_root
        .canonicalize()
        .with_context(|| format!("resolve source {}", source_root.display()))?;
    let output_root = output_root
        .canonicalize()
        .with_context(|| format!("resolve output {}", output_root.display()))?;
    let artifacts: Vec<PathBuf> = artifacts.iter().map(|path| resolve_lenient(path)).collect();

    let mut report = TransformReport::default();
    let walker = WalkDir::new(&source_root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| should_visit(entry, &output_root, &artifacts));

    for entry in walker {
        let entry = entry.with_context(|| format!("walk {}", source_root.display()))?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(&source_root)
            .with_context(|| format!("relativize {}", entry.path().display()))?
            .to_path_buf();
        if !file_type.is_file() {
            debug!(path = %rel.display(), "not a regular file, ignoring");
            report.ignored += 1;
            continue;
        }

        let dst = output_root.join(&rel);
        match classify(&entry.file_name().to_string_lossy()) {
            FileKind::Json => minify_entry(entry.path(), &dst, rel, &mut report)?,
            FileKind::Verbatim => copy_entry(entry.path(), &dst, &mut report)?,
        }
    }

    info!(
        minified = report.minified,
        copied = report.copied,
        skipped = report.skipped.len(),
        "tree transformed"
    );
    Ok(report)
}

fn should_visit(entry: &DirEntry, output_root: &Path, artifacts: &[PathBuf]) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    if entry.file_name().to_str().is_some_and(is_excluded) {
        debug!(path = %entry.path().display(), "pruned by name");
        return false;
    }
    if entry.file_type().is_dir() && entry.path() == output_root {
        debug!(path = %entry.path().display(), "pruned output root nested in source");
        return false;
    }
    if artifacts.iter().any(|artifact| artifact == entry.path()) {
        debug!(path = %entry.path().display(), "pruned run artifact nested in source");
        return false;
    }
    true
}

/// Canonical form of `path`, resolving only the parent when the file itself
/// does not exist yet, so it compares equal to walker paths.
fn resolve_lenient(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|parent| parent.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

fn minify_entry(src: &Path, dst: &Path, rel: PathBuf, report: &mut TransformReport) -> Result<()> {
    let raw = fs::read(src).with_context(|| format!("read {}", src.display()))?;
    report.bytes_read += raw.len() as u64;

    let minified = match minify_json(&raw) {
        Ok(minified) => minified,
        Err(err) => {
            debug!(path = %rel.display(), err = %err, "invalid JSON skipped");
            if dst.is_file() {
                fs::remove_file(dst)
                    .with_context(|| format!("remove stale {}", dst.display()))?;
            }
            report.skipped.push(SkippedFile {
                path: rel,
                reason: err.to_string(),
            });
            return Ok(());
        }
    };

    ensure_parent(dst)?;
    fs::write(dst, &minified).with_context(|| format!("write {}", dst.display()))?;
    report.bytes_written += minified.len() as u64;
    report.minified += 1;
    Ok(())
}

fn copy_entry(src: &Path, dst: &Path, report: &mut TransformReport) -> Result<()> {
    ensure_parent(dst)?;
    let bytes = fs::copy(src, dst)
        .with_context(|| format!("copy {} to {}", src.display(), dst.display()))?;
    report.bytes_read += bytes;
    report.bytes_written += bytes;
    report.copied += 1;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    Ok(())
}

/// Set the modification time of every file and directory under `root`
/// (including `root`) to `epoch_secs`, so archive entries carry stable
/// timestamps across runs.
#[instrument(skip_all, fields(root = %root.display(), epoch_secs))]
pub fn normalize_mtimes(root: &Path, epoch_secs: u64) -> Result<()> {
    let stamp = UNIX_EPOCH + Duration::from_secs(epoch_secs);
    let mut touched = 0usize;
    // Children first, so a directory's stamp is not disturbed afterwards.
    for entry in WalkDir::new(root).follow_links(false).contents_first(true) {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        let file_type = entry.file_type();
        if file_type.is_file() {
            set_file_mtime(entry.path(), stamp)?;
            touched += 1;
        } else if file_type.is_dir() {
            set_dir_mtime(entry.path(), stamp)?;
            touched += 1;
        }
    }
    debug!(touched, "mtimes normalized");
    Ok(())
}

#[cfg(unix)]
fn set_file_mtime(path: &Path, stamp: SystemTime) -> Result<()> {
    // Owner may set times through a read-only handle.
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    file.set_modified(stamp)
        .with_context(|| format!("set mtime {}", path.display()))
}

#[cfg(not(unix))]
fn set_file_mtime(path: &Path, stamp: SystemTime) -> Result<()> {
    let file = fs::File::options()
        .write(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    file.set_modified(stamp)
        .with_context(|| format!("set mtime {}", path.display()))
}

#[cfg(unix)]
fn set_dir_mtime(path: &Path, stamp: SystemTime) -> Result<()> {
    set_file_mtime(path, stamp)
}

#[cfg(not(unix))]
fn set_dir_mtime(path: &Path, _stamp: SystemTime) -> Result<()> {
    debug!(path = %path.display(), "directory mtimes not supported on this platform");
    Ok(())
}
