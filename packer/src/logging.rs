//! Diagnostic tracing for debugging packer runs.
//!
//! Tracing is developer-facing: it goes to stderr and is filtered by
//! `RUST_LOG` or the `-v` flag. The run's own output (skipped-file warnings,
//! progress, digest, summary) is printed by `pipeline` and `main` and does not
//! depend on the filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directive used when `RUST_LOG` is unset.
///
/// `0` keeps warnings only; each `-v` raises packer's own events one level
/// while dependencies stay at `warn`.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,packer=info",
        2 => "warn,packer=debug",
        _ => "warn,packer=trace",
    }
}

/// Install the stderr subscriber. `RUST_LOG`, when set and valid, takes
/// precedence over `verbosity`.
///
/// ```bash
/// RUST_LOG=packer=debug packer src out pack.zip
/// packer -vv src out pack.zip
/// ```
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity > 1)
                .compact(),
        )
        .init();
}
