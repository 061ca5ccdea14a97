//! Stable exit codes for `photrunner` commands.

use crate::error::RunnerError;

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid arguments or config, missing files, or any other error.
pub const INVALID: i32 = 1;
/// An external tool could not be launched or exited with an error.
pub const PROCESS_FAILED: i32 = 2;
/// A tool answered, but not with the expected response.
pub const PARSE_FAILED: i32 = 3;

/// Exit code for a failure, looking through `anyhow` context for a runner error.
pub fn for_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<RunnerError>() {
        Some(e) if e.is_process_failure() => PROCESS_FAILED,
        Some(e) if e.is_parse_failure() => PARSE_FAILED,
        _ => INVALID,
    }
}
