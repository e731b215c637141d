//! I/O helpers: configuration, input files, and FHI-aims execution.

pub mod config;
pub mod executor;
pub mod inputs;
pub mod process;
