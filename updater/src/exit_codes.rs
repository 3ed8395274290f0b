//! Stable exit codes for updater CLI commands.

/// Command succeeded (including runs that found no updates).
pub const OK: i32 = 0;
/// Command failed due to invalid config, I/O, or other errors.
pub const INVALID: i32 = 1;
/// Caller is not in the authorized principal set.
pub const UNAUTHORIZED: i32 = 2;
/// Another update run was already in flight.
pub const BUSY: i32 = 3;
/// Process stopped so a supervisor can relaunch it (`EX_TEMPFAIL`).
pub const RESTART_REQUESTED: i32 = 75;
