//! Archive adapter for the external compression tool.
//!
//! The [`Archiver`] trait decouples the pipeline from the actual tool. Tests
//! use a scripted archiver that writes fixed bytes without spawning processes.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::io::config::{ArchiveConfig, ArchiveTool};
use crate::io::process::run_command_with_timeout;

/// Lines of tool stderr carried in a [`ArchiveError::ToolFailed`] message.
const STDERR_TAIL_LINES: usize = 10;

/// Parameters for an archiver invocation.
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    /// Directory whose contents become the archive's top-level entries.
    pub output_root: PathBuf,
    /// Archive file to create or replace.
    pub archive_path: PathBuf,
}

/// Abstraction over archive backends.
pub trait Archiver {
    /// Produce `request.archive_path` from the contents of `request.output_root`.
    fn archive(&self, request: &ArchiveRequest) -> Result<()>;
}

/// Fatal archiving conditions that callers may need to tell apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    /// The executable could not be found.
    ToolMissing { program: String },
    /// The tool ran and exited unsuccessfully.
    ToolFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    /// The tool exceeded the configured timeout and was killed.
    TimedOut { program: String, timeout_secs: u64 },
    /// The tool exited successfully but left no archive behind.
    NoArchive { program: String, path: PathBuf },
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveError::ToolMissing { program } => write!(
                f,
                "compression tool `{program}` not found (install it or choose another tool with --tool/--program)"
            ),
            ArchiveError::ToolFailed {
                program,
                code,
                stderr,
            } => {
                match code {
                    Some(code) => write!(f, "compression tool `{program}` failed with exit code {code}")?,
                    None => write!(f, "compression tool `{program}` was terminated by a signal")?,
                }
                if !stderr.is_empty() {
                    write!(f, ":\n{stderr}")?;
                }
                Ok(())
            }
            ArchiveError::TimedOut {
                program,
                timeout_secs,
            } => write!(
                f,
                "compression tool `{program}` timed out after {timeout_secs}s"
            ),
            ArchiveError::NoArchive { program, path } => write!(
                f,
                "compression tool `{program}` succeeded but {} was not created",
                path.display()
            ),
        }
    }
}

impl std::error::Error for ArchiveError {}

/// Archiver that shells out to `7z` or `zip`.
#[derive(Debug, Clone)]
pub struct ToolArchiver {
    pub tool: ArchiveTool,
    pub program: String,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl ToolArchiver {
    pub fn from_config(cfg: &ArchiveConfig) -> Self {
        Self {
            tool: cfg.tool,
            program: cfg.program().to_string(),
            timeout: cfg.timeout(),
            output_limit_bytes: cfg.output_limit_bytes,
        }
    }

    fn command(&self, request: &ArchiveRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(tool_args(self.tool, &request.archive_path))
            .current_dir(&request.output_root);
        cmd
    }
}

impl Archiver for ToolArchiver {
    #[instrument(skip_all, fields(tool = ?self.tool, program = %self.program))]
    fn archive(&self, request: &ArchiveRequest) -> Result<()> {
        prepare_destination(&request.archive_path)?;

        let cmd = self.command(request);
        debug!(args = ?cmd.get_args().collect::<Vec<_>>(), "running compression tool");
        let output = match run_command_with_timeout(cmd, self.timeout, self.output_limit_bytes) {
            Ok(output) => output,
            Err(err) => {
                let not_found = err
                    .downcast_ref::<io::Error>()
                    .is_some_and(|e| e.kind() == io::ErrorKind::NotFound);
                if not_found {
                    return Err(ArchiveError::ToolMissing {
                        program: self.program.clone(),
                    }
                    .into());
                }
                return Err(err);
            }
        };

        if !output.stdout.is_empty() {
            debug!(stdout = %String::from_utf8_lossy(&output.stdout), "tool stdout");
        }
        if output.timed_out {
            return Err(ArchiveError::TimedOut {
                program: self.program.clone(),
                timeout_secs: self.timeout.as_secs(),
            }
            .into());
        }
        if !output.status.success() {
            return Err(ArchiveError::ToolFailed {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: output.stderr_tail(STDERR_TAIL_LINES),
            }
            .into());
        }
        if !request.archive_path.is_file() {
            return Err(ArchiveError::NoArchive {
                program: self.program.clone(),
                path: request.archive_path.clone(),
            }
            .into());
        }

        info!(archive = %request.archive_path.display(), "archive created");
        Ok(())
    }
}

/// Argument list for `tool`, run from inside the output root.
///
/// Entry paths end up relative to the working directory, so extracting the
/// archive reproduces the output tree's top level without a wrapper folder.
pub fn tool_args(tool: ArchiveTool, archive_path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = match tool {
        // Zip container, level 9, 258-byte match window, 15 deflate passes.
        // Directories matched by `*` are always added recursively.
        ArchiveTool::Sevenzip => ["a", "-tzip", "-mx=9", "-mfb=258", "-mpass=15"]
            .into_iter()
            .map(OsString::from)
            .collect(),
        // -X drops uid/gid extra fields so identical trees give identical bytes.
        ArchiveTool::Zip => ["-r", "-9", "-X", "-q"]
            .into_iter()
            .map(OsString::from)
            .collect(),
    };
    args.push(archive_path.as_os_str().to_os_string());
    args.push(OsString::from(match tool {
        ArchiveTool::Sevenzip => "*",
        ArchiveTool::Zip => ".",
    }));
    args
}

/// Create the archive's parent directory and remove a previous archive.
///
/// Both tools update an existing archive in place instead of replacing it.
pub fn prepare_destination(archive_path: &Path) -> Result<()> {
    if let Some(parent) = archive_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create archive dir {}", parent.display()))?;
    }
    match fs::remove_file(archive_path) {
        Ok(()) => {
            debug!(path = %archive_path.display(), "removed previous archive");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            Err(err).with_context(|| format!("remove previous archive {}", archive_path.display()))
        }
    }
}
