//! Helpers for running child processes with timeouts and bounded output.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Exit status and bounded output of a finished child process.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Last `max_lines` non-empty lines of stderr, lossily decoded.
    pub fn stderr_tail(&self, max_lines: usize) -> String {
        tail_lines(&self.stderr, max_lines)
    }
}

/// Background reader that empties one child pipe, keeping at most `limit` bytes.
struct Drain {
    name: &'static str,
    handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>,
}

impl Drain {
    fn spawn<R>(name: &'static str, pipe: Option<R>, limit: usize) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let pipe = pipe.ok_or_else(|| anyhow!("{name} was not piped"))?;
        Ok(Self {
            name,
            handle: thread::spawn(move || read_stream_limited(pipe, limit)),
        })
    }

    /// Wait for the reader and return the kept bytes.
    fn finish(self) -> Result<Vec<u8>> {
        let (kept, discarded) = self
            .handle
            .join()
            .map_err(|_| anyhow!("{} reader thread panicked", self.name))?
            .with_context(|| format!("read {}", self.name))?;
        if discarded > 0 {
            warn!(stream = self.name, discarded, "tool output truncated");
        }
        Ok(kept)
    }
}

/// Run `cmd` to completion with stdin closed, killing it after `timeout`.
///
/// Both pipes are drained on reader threads while the child runs, so a chatty
/// tool cannot block on a full pipe; only the first `output_limit_bytes` of
/// each stream are kept.
///
/// A spawn failure is returned with the underlying [`std::io::Error`] intact, so callers can
/// check for [`std::io::ErrorKind::NotFound`] through `downcast_ref`.
#[instrument(skip_all, fields(program = ?cmd.get_program(), timeout_secs = timeout.as_secs()))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .inspect_err(|err| error!(err = %err, "failed to spawn command"))
        .with_context(|| format!("spawn {:?}", cmd.get_program()))?;

    let stdout = Drain::spawn("stdout", child.stdout.take(), output_limit_bytes)?;
    let stderr = Drain::spawn("stderr", child.stderr.take(), output_limit_bytes)?;

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => (status, false),
        None => {
            warn!("command timed out, killing");
            child.kill().context("kill command")?;
            (child.wait().context("wait command after kill")?, true)
        }
    };

    let stdout = stdout.finish()?;
    let stderr = stderr.finish()?;
    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

/// Read `reader` to the end, returning the first `limit` bytes and the count discarded.
fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut discarded = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            return Ok((kept, discarded));
        }
        let keep = n.min(limit.saturating_sub(kept.len()));
        kept.extend_from_slice(&chunk[..keep]);
        discarded += n - keep;
    }
}

fn tail_lines(bytes: &[u8], max_lines: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
