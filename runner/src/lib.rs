//! Scripted runs of the DAOPHOT suite (`daophot`, `allstar`) over stdin/stdout.
//!
//! The interactive tools read one flat script and answer with one interleaved
//! output stream. This crate builds that script from logical commands, runs
//! the tool in a private working directory and splits the output back into
//! typed per-command results, lazily and in issue order.
//!
//! - **[`core`]**: Pure, in-memory logic (script buffer, output chain, phases).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side effects (working directories, processes, configuration).
//!
//! [`runner`] ties both together; [`results`] parse each command's output;
//! [`tools`] format the commands; [`pool`] runs cloned workers side by side.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pool;
pub mod results;
pub mod runner;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;

pub use error::{Result, RunnerError};
pub use runner::{Position, Runner, RunnerSettings, StagedFile};
