//! Test-only helpers for building source trees and scripting archivers.

use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::io::archive::{ArchiveRequest, Archiver, prepare_destination};

/// Temporary source tree populated file by file.
pub struct SourceTree {
    dir: TempDir,
}

impl SourceTree {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir().context("create temp source tree")?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` at `rel`, creating parent directories.
    pub fn file(&self, rel: &str, contents: &[u8]) -> Result<()> {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }
}

/// What a [`ScriptedArchiver`] does when invoked.
enum Script {
    Fixed(Vec<u8>),
    Listing,
    Fail(String),
}

/// Archiver that writes scripted bytes (or fails) without spawning a process.
pub struct ScriptedArchiver {
    script: Script,
    calls: Cell<usize>,
}

impl ScriptedArchiver {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            calls: Cell::new(0),
        }
    }

    /// Always write `bytes`, whatever the output tree holds.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self::with_script(Script::Fixed(bytes))
    }

    /// Write a deterministic listing of the output tree (sorted relative
    /// paths followed by file contents), so the archive changes exactly when
    /// the tree does.
    pub fn listing() -> Self {
        Self::with_script(Script::Listing)
    }

    pub fn failing(message: &str) -> Self {
        Self::with_script(Script::Fail(message.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Archiver for ScriptedArchiver {
    fn archive(&self, request: &ArchiveRequest) -> Result<()> {
        self.calls.set(self.calls.get() + 1);
        let bytes = match &self.script {
            Script::Fixed(bytes) => bytes.clone(),
            Script::Listing => tree_listing(&request.output_root)?,
            Script::Fail(message) => return Err(anyhow!(message.clone())),
        };
        prepare_destination(&request.archive_path)?;
        fs::write(&request.archive_path, bytes)
            .with_context(|| format!("write {}", request.archive_path.display()))
    }
}

fn tree_listing(root: &Path) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(root).context("relativize")?;
        bytes.extend_from_slice(rel.to_string_lossy().as_bytes());
        bytes.push(0);
        bytes.extend(fs::read(entry.path()).with_context(|| format!("read {}", entry.path().display()))?);
        bytes.push(0);
    }
    Ok(bytes)
}

/// True when `program` can be spawned from `PATH`.
pub fn tool_available(program: &str) -> bool {
    Command::new(program)
        .arg("-h")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// Empty zip archive: a lone end-of-central-directory record.
pub const EMPTY_ZIP: [u8; 22] = [
    b'P', b'K', 5, 6, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// Write an executable stand-in for `zip` into `dir`.
///
/// Called with zip's argument layout (`-r -9 -X -q <archive> .`), it writes
/// [`EMPTY_ZIP`] to the archive path and exits 0.
#[cfg(unix)]
pub fn fake_zip_program(dir: &Path) -> Result<std::path::PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-zip");
    let zeros = "\\000".repeat(18);
    let script = format!("#!/bin/sh\nprintf 'PK\\005\\006{zeros}' > \"$5\"\n");
    fs::write(&path, script).with_context(|| format!("write {}", path.display()))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("chmod {}", path.display()))?;
    Ok(path)
}
