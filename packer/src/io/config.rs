//! Packer configuration, read from `packer.toml` or an explicit `--config` path.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// File name looked up in the current directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "packer.toml";

/// Packer configuration (TOML).
///
/// Every field is optional in the file; missing fields take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct PackerConfig {
    pub archive: ArchiveConfig,
    pub output: OutputConfig,
}

/// External compression tool selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveTool {
    /// 7-Zip writing the zip format at maximum ratio.
    #[default]
    Sevenzip,
    /// Info-ZIP `zip`.
    Zip,
}

impl ArchiveTool {
    /// Executable looked up on `PATH` when no override is configured.
    pub fn default_program(self) -> &'static str {
        match self {
            ArchiveTool::Sevenzip => "7z",
            ArchiveTool::Zip => "zip",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArchiveConfig {
    pub tool: ArchiveTool,

    /// Executable override (e.g. `7za` or `/opt/7zip/7zz`).
    pub program: Option<String>,

    /// Kill the tool after this many seconds.
    pub timeout_secs: u64,

    /// Keep at most this many bytes of the tool's stdout/stderr.
    pub output_limit_bytes: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            tool: ArchiveTool::default(),
            program: None,
            timeout_secs: 30 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl ArchiveConfig {
    pub fn program(&self) -> &str {
        self.program
            .as_deref()
            .unwrap_or_else(|| self.tool.default_program())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    /// Reset file and directory mtimes in the output tree before archiving.
    pub normalize_mtime: bool,

    /// Timestamp (seconds since the Unix epoch) used by `normalize_mtime`.
    pub mtime_epoch: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            normalize_mtime: true,
            // 2000-01-01T00:00:00Z, safely inside the DOS date range zip uses.
            mtime_epoch: 946_684_800,
        }
    }
}

impl PackerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.archive.timeout_secs == 0 {
            return Err(anyhow!("archive.timeout_secs must be > 0"));
        }
        if self.archive.output_limit_bytes == 0 {
            return Err(anyhow!("archive.output_limit_bytes must be > 0"));
        }
        if let Some(program) = &self.archive.program
            && program.trim().is_empty()
        {
            return Err(anyhow!("archive.program must not be blank"));
        }
        Ok(())
    }
}

/// Where the configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicit path; the file must exist.
    Explicit(PathBuf),
    /// Read this path if present and fall back to defaults when it is absent.
    Optional(PathBuf),
}

impl ConfigSource {
    /// `--config` when given, otherwise `packer.toml` in `cwd`.
    pub fn resolve(explicit: Option<PathBuf>, cwd: &Path) -> Self {
        match explicit {
            Some(path) => ConfigSource::Explicit(path),
            None => ConfigSource::Optional(cwd.join(DEFAULT_CONFIG_FILE)),
        }
    }
}

/// Load config from a TOML file.
///
/// An optional source that does not exist yields `PackerConfig::default()`.
pub fn load_config(source: &ConfigSource) -> Result<PackerConfig> {
    let path = match source {
        ConfigSource::Explicit(path) => path,
        ConfigSource::Optional(path) => {
            if !path.exists() {
                debug!(path = %path.display(), "no config file, using defaults");
                let cfg = PackerConfig::default();
                cfg.validate()?;
                return Ok(cfg);
            }
            path
        }
    };
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PackerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    debug!(path = %path.display(), ?cfg, "loaded config");
    Ok(cfg)
}
