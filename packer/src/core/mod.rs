//! Deterministic, pure logic shared by the packaging pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on names and
//! in-memory buffers and return deterministic outputs suitable for tests.

pub mod classify;
pub mod minify;
