//! Side-effecting stages of the packaging pipeline.

pub mod archive;
pub mod config;
pub mod digest;
pub mod process;
pub mod transform;
