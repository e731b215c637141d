//! Stable exit codes for `aims` CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid job/config/reference, a failed calculation, or any other error.
pub const INVALID: i32 = 1;
/// Written inputs differ from the reference inputs.
pub const MISMATCH: i32 = 2;
