//! Directory packaging: mirror a source tree with JSON minified, zip the
//! result with an external tool, and record the archive's SHA-256.
//!
//! - **[`core`]**: pure name classification and JSON minification.
//! - **[`io`]**: side-effecting stages (tree transform, archiving, digest,
//!   configuration, child processes).
//!
//! [`pipeline`] runs the stages in order for the `packer` binary.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
