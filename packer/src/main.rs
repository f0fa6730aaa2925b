//! `packer`: minify JSON, mirror a directory tree, zip it and record its SHA-256.
//!
//! ```text
//! packer <SOURCE> <OUTPUT> <ARCHIVE> [--tool sevenzip|zip] [--program NAME]
//! ```
//!
//! The digest lands in `checksum.sha256` in the current directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::debug;

use packer::exit_codes;
use packer::io::archive::ToolArchiver;
use packer::io::config::{ArchiveTool, ConfigSource, PackerConfig, load_config};
use packer::logging;
use packer::pipeline::{PipelineRequest, run_pipeline};

/// Environment variable that pins output mtimes for reproducible archives.
const SOURCE_DATE_EPOCH: &str = "SOURCE_DATE_EPOCH";

#[derive(Parser, Debug)]
#[command(
    name = "packer",
    version,
    about = "Minify JSON, mirror a directory tree, zip it and record its SHA-256"
)]
struct Cli {
    /// Directory to package.
    source: PathBuf,
    /// Directory that receives the transformed tree (created if missing).
    output: PathBuf,
    /// Zip archive to create or replace.
    archive: PathBuf,

    /// Compression tool (overrides `archive.tool`).
    #[arg(long, value_enum)]
    tool: Option<ToolArg>,
    /// Executable to run instead of the tool's default (e.g. `7za`).
    #[arg(long)]
    program: Option<String>,
    /// Config file (defaults to `packer.toml` in the current directory, if present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Kill the compression tool after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Keep the copied files' own modification times.
    #[arg(long)]
    no_normalize_mtime: bool,
    /// Log more detail to stderr (repeat for more; `RUST_LOG` overrides).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ToolArg {
    Sevenzip,
    Zip,
}

impl From<ToolArg> for ArchiveTool {
    fn from(arg: ToolArg) -> Self {
        match arg {
            ToolArg::Sevenzip => ArchiveTool::Sevenzip,
            ToolArg::Zip => ArchiveTool::Zip,
        }
    }
}

impl Cli {
    /// Fold command-line overrides into the loaded config.
    fn apply(&self, cfg: &mut PackerConfig) {
        if let Some(tool) = self.tool {
            cfg.archive.tool = tool.into();
        }
        if let Some(program) = &self.program {
            cfg.archive.program = Some(program.clone());
        }
        if let Some(timeout_secs) = self.timeout_secs {
            cfg.archive.timeout_secs = timeout_secs;
        }
        if self.no_normalize_mtime {
            cfg.output.normalize_mtime = false;
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("error: {:#}", err);
        std::process::exit(exit_codes::FAILURE);
    }
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("read current directory")?;
    let mut cfg = load_config(&ConfigSource::resolve(cli.config.clone(), &cwd))?;
    cli.apply(&mut cfg);
    if let Some(epoch) = source_date_epoch(std::env::var(SOURCE_DATE_EPOCH).ok().as_deref())? {
        cfg.output.mtime_epoch = epoch;
    }
    cfg.validate()?;
    debug!(?cfg, "effective config");

    let archiver = ToolArchiver::from_config(&cfg.archive);
    let request = PipelineRequest {
        source: cli.source,
        output: cli.output,
        archive: cli.archive,
        digest_dir: cwd,
        mtime_epoch: cfg
            .output
            .normalize_mtime
            .then_some(cfg.output.mtime_epoch),
    };
    let outcome = run_pipeline(&request, &archiver)?;

    println!(
        "Done. Output folder: {} | Zip file: {} ({} minified, {} copied, {} skipped)",
        outcome.output.display(),
        outcome.archive.display(),
        outcome.transform.minified,
        outcome.transform.copied,
        outcome.transform.skipped.len()
    );
    Ok(())
}

/// Parse a `SOURCE_DATE_EPOCH` value; unset or empty means "no override".
fn source_date_epoch(raw: Option<&str>) -> Result<Option<u64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("{SOURCE_DATE_EPOCH} must be a non-negative integer, got {value:?}")),
    }
}
