//! Lifecycle phases of one external-process run.

use std::fmt;

/// Where a runner's current script is in its lifecycle.
///
/// Transitions only move forward: `Idle -> Running -> Finished`. A reset
/// starts a new round in `Idle` rather than moving a finished round back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Script may be pending; no process exists yet.
    Idle,
    /// Process started, output not yet captured.
    Running,
    /// Output captured and exit code known.
    Finished,
}

impl Phase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
