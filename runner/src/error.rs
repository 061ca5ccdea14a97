//! Typed failures raised by the runner engine.
//!
//! Three families matter to callers:
//!
//! - **process** failures (`Spawn`, `ProcessExit`, `NotRun`) surface at the
//!   operation that started or awaited the external program;
//! - **parse** failures (`Parse`) surface lazily, when an accessor of one
//!   command result is read, and carry the consumed output buffer;
//! - **staging** failures (`MissingInput`, `MissingOutput`, `OutputsNotCopied`)
//!   surface when files are moved in or out of the working directory; promised
//!   outputs that a finished run failed to produce are reported by `run` and
//!   `wait_for_results`, never by result accessors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = RunnerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to launch {executable}: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: io::Error,
    },

    #[error("{executable} finished with exit code {code}; stderr:\n{stderr}")]
    ProcessExit {
        executable: String,
        /// Exit code, negated signal number when the process was killed.
        code: i32,
        stderr: String,
    },

    #[error("asked for results of {executable} before any run")]
    NotRun { executable: String },

    #[error("no output stream available, run the script before collecting results")]
    NoOutputStream,

    #[error("{command} output did not match the expected response ({reason}). Output buffer:\n{buffer}")]
    Parse {
        command: &'static str,
        reason: String,
        buffer: String,
    },

    #[error("input file {} not found", path.display())]
    MissingInput { path: PathBuf },

    #[error("expected output {local} was not produced in {}", dir.display())]
    MissingOutput { local: String, dir: PathBuf },

    #[error("promised output files were not copied out: {}", failures.join("; "))]
    OutputsNotCopied { failures: Vec<String> },

    #[error("cannot {operation} while the process is {phase}")]
    InvalidState {
        operation: &'static str,
        phase: &'static str,
    },

    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl RunnerError {
    pub fn parse(command: &'static str, reason: impl Into<String>, buffer: &str) -> Self {
        Self::Parse {
            command,
            reason: reason.into(),
            buffer: buffer.to_string(),
        }
    }

    /// True for failures of the external process itself (launch, exit code, missing run).
    pub fn is_process_failure(&self) -> bool {
        matches!(
            self,
            Self::Spawn { .. } | Self::ProcessExit { .. } | Self::NotRun { .. }
        )
    }

    pub fn is_parse_failure(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    pub fn is_staging_failure(&self) -> bool {
        matches!(
            self,
            Self::MissingInput { .. } | Self::MissingOutput { .. } | Self::OutputsNotCopied { .. }
        )
    }
}

/// Attach a lazily built context message to I/O failures.
pub(crate) trait IoContext<T> {
    fn io_context<F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| RunnerError::Io {
            context: context(),
            source,
        })
    }
}
