//! Stable exit codes for the packer CLI.

/// Run completed (malformed JSON files may have been skipped).
pub const OK: i32 = 0;
/// I/O failure, invalid configuration or a missing/failing compression tool.
pub const FAILURE: i32 = 1;
/// Missing or malformed arguments (clap's usage exit code).
pub const USAGE: i32 = 2;
