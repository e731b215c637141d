//! Driving FHI-aims calculations, for real or against recorded references.
//!
//! - **[`core`]**: Pure logic (geometry and control rendering, output
//!   parsing, input comparison). No I/O.
//! - **[`io`]**: Side effects (configuration, input files, process
//!   execution). The [`io::executor::AimsExecutor`] trait is the single seam
//!   between a workflow and the FHI-aims binary.
//! - **[`testing`]** (feature `test-support`): a reference-replaying executor,
//!   input checks and a working directory guard for tests and tutorials.
//!
//! [`job`] combines both layers to run one calculation end-to-end.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod job;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
