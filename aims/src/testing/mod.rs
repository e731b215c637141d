//! Test doubles for workflows that drive FHI-aims.
//!
//! - [`reference`]: an [`AimsExecutor`](crate::io::executor::AimsExecutor)
//!   that replays recorded outputs instead of running the binary.
//! - [`checks`]: comparisons of written inputs against recorded inputs.
//! - [`cwd`]: serialized, self-restoring working directory changes.
//! - [`fixtures`]: structures, parameters and on-disk reference cases.

pub mod checks;
pub mod cwd;
pub mod fixtures;
pub mod reference;

pub use checks::{InputMismatch, check_inputs};
pub use cwd::CwdGuard;
pub use reference::{ExecRecord, FakeRunOptions, ReferenceExecutor, fake_run_aims};
