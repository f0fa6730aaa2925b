//! Orchestration for a single `packer` run: transform, archive, digest.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{info, instrument};

use crate::io::archive::{ArchiveRequest, Archiver};
use crate::io::digest::{DIGEST_FILE_NAME, DigestRecord, record_digest};
use crate::io::transform::{TransformReport, normalize_mtimes, transform_tree};

/// Inputs for one packaging run.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub source: PathBuf,
    pub output: PathBuf,
    pub archive: PathBuf,
    /// Directory that receives the digest record (the invoking process's cwd).
    pub digest_dir: PathBuf,
    /// When `Some`, output mtimes are reset to this many seconds after the Unix epoch.
    pub mtime_epoch: Option<u64>,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub output: PathBuf,
    pub archive: PathBuf,
    pub transform: TransformReport,
    pub digest: DigestRecord,
}

/// Absolute, validated paths for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedPaths {
    source: PathBuf,
    output: PathBuf,
    archive: PathBuf,
}

/// Run the three stages in order, stopping at the first fatal error.
///
/// Paths are validated before anything is written. Malformed JSON files are
/// reported on stderr and skipped without failing the run.
#[instrument(skip_all, fields(source = %request.source.display()))]
pub fn run_pipeline<A: Archiver>(request: &PipelineRequest, archiver: &A) -> Result<PipelineOutcome> {
    let paths = resolve_paths(&request.source, &request.output, &request.archive)?;

    let artifacts = [
        paths.archive.clone(),
        request.digest_dir.join(DIGEST_FILE_NAME),
    ];
    let transform =
        transform_tree(&paths.source, &paths.output, &artifacts).context("transform tree")?;
    for skipped in &transform.skipped {
        eprintln!(
            "warning: invalid JSON skipped: {} ({})",
            skipped.path.display(),
            skipped.reason
        );
    }
    if let Some(epoch) = request.mtime_epoch {
        normalize_mtimes(&paths.output, epoch).context("normalize output mtimes")?;
    }

    println!("Zipping {} ...", paths.output.display());
    archiver
        .archive(&ArchiveRequest {
            output_root: paths.output.clone(),
            archive_path: paths.archive.clone(),
        })
        .context("archive output tree")?;

    let digest = record_digest(&paths.archive, &request.digest_dir).context("record digest")?;
    println!("SHA-256: {}", digest.hex);
    println!("Digest file: {}", digest.path.display());

    info!(
        files = transform.files_written(),
        skipped = transform.skipped.len(),
        "pipeline finished"
    );
    Ok(PipelineOutcome {
        output: paths.output,
        archive: paths.archive,
        transform,
        digest,
    })
}

/// Make every path absolute and reject layouts that would corrupt the run.
fn resolve_paths(source: &Path, output: &Path, archive: &Path) -> Result<ResolvedPaths> {
    if !source.is_dir() {
        bail!("source {} is not a directory", source.display());
    }
    let source = source
        .canonicalize()
        .with_context(|| format!("resolve source {}", source.display()))?;
    let output = absolute(output)?;
    let archive = absolute(archive)?;

    if output == source {
        bail!("output directory must differ from source directory");
    }
    if archive.starts_with(&output) {
        bail!(
            "archive {} must not be inside the output directory {}",
            archive.display(),
            output.display()
        );
    }
    if archive.is_dir() {
        bail!("archive path {} is a directory", archive.display());
    }
    Ok(ResolvedPaths {
        source,
        output,
        archive,
    })
}

/// Absolute form of `path`, following symlinks for whatever part already exists.
fn absolute(path: &Path) -> Result<PathBuf> {
    if let Ok(resolved) = path.canonicalize() {
        return Ok(resolved);
    }
    std::path::absolute(path).with_context(|| format!("resolve {}", path.display()))
}
