//! Typed per-command results read lazily from a round's output chain.
//!
//! Every logical command returns a result wrapping a [`ResultHandle`]. The
//! first read of any accessor finishes the round (starting it if it is still
//! queued), claims the command's share of the output stream and parses it;
//! later reads are cache hits. A result whose expected response is missing
//! fails only when one of its own accessors is read.

pub mod allstar;
pub mod daophot;

use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::chain::{NodeId, Terminator};
use crate::error::{Result, RunnerError};
use crate::runner::Session;

pub use allstar::{AllstarOptionsResult, AllstarResult};
pub use daophot::{
    AttachResult, FindResult, FindStats, OptionsResult, PhotometryResult, PickResult, PsfFit,
    PsfResult, option_key,
};

static COMMAND_PROMPT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Command:").unwrap());

/// Ends at the tool's interactive `Command:` prompt.
pub fn command_prompt() -> Terminator {
    Terminator::Pattern(COMMAND_PROMPT.clone())
}

/// Access to one command's share of the output stream.
#[derive(Clone)]
pub struct ResultHandle {
    session: Rc<RefCell<Session>>,
    node: NodeId,
    buffer: OnceCell<String>,
}

impl ResultHandle {
    pub(crate) fn new(session: Rc<RefCell<Session>>, node: NodeId) -> Self {
        Self {
            session,
            node,
            buffer: OnceCell::new(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Output claimed by this command, blocking until the round has finished.
    pub fn buffer(&self) -> Result<&str> {
        if let Some(text) = self.buffer.get() {
            return Ok(text);
        }
        let text = self.session.borrow_mut().consume(self.node)?;
        Ok(self.buffer.get_or_init(|| text))
    }

    pub fn is_read(&self) -> bool {
        self.buffer.get().is_some()
    }
}

impl fmt::Debug for ResultHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultHandle")
            .field("node", &self.node)
            .field("read", &self.is_read())
            .finish_non_exhaustive()
    }
}

/// One logical command's typed view of its output.
pub trait CommandResult: Sized {
    /// Command name used in logs and parse errors.
    const COMMAND: &'static str;

    fn terminator() -> Terminator;

    fn from_handle(handle: ResultHandle) -> Self;

    fn handle(&self) -> &ResultHandle;

    /// Parse everything the result exposes, reporting the first failure.
    fn check(&self) -> Result<()>;

    /// Non-failing form of [`check`](CommandResult::check).
    fn success(&self) -> bool {
        self.check().is_ok()
    }

    fn buffer(&self) -> Result<&str> {
        self.handle().buffer()
    }
}

/// Result for commands whose output is only delimited, never parsed.
#[derive(Debug, Clone)]
pub struct PromptResult {
    handle: ResultHandle,
}

impl CommandResult for PromptResult {
    const COMMAND: &'static str = "COMMAND";

    fn terminator() -> Terminator {
        command_prompt()
    }

    fn from_handle(handle: ResultHandle) -> Self {
        Self { handle }
    }

    fn handle(&self) -> &ResultHandle {
        &self.handle
    }

    fn check(&self) -> Result<()> {
        self.buffer().map(|_| ())
    }
}

/// Compute once, then serve clones.
pub(crate) fn cached<T, F>(cell: &OnceCell<T>, compute: F) -> Result<T>
where
    T: Clone,
    F: FnOnce() -> Result<T>,
{
    if let Some(value) = cell.get() {
        return Ok(value.clone());
    }
    let value = compute()?;
    Ok(cell.get_or_init(|| value).clone())
}

/// Parse capture group `index`, reporting a parse failure of `command` on error.
pub(crate) fn group<T: FromStr>(
    captures: &regex::Captures<'_>,
    index: usize,
    command: &'static str,
    buffer: &str,
) -> Result<T> {
    let text = captures
        .get(index)
        .map(|m| m.as_str())
        .ok_or_else(|| RunnerError::parse(command, format!("group {index} missing"), buffer))?;
    text.parse()
        .map_err(|_| RunnerError::parse(command, format!("cannot parse number {text:?}"), buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_computes_once() {
        let cell = OnceCell::new();
        let mut calls = 0;
        let first = cached(&cell, || {
            calls += 1;
            Ok(7)
        })
        .expect("first");
        let second = cached(&cell, || -> Result<i32> { panic!("recomputed") }).expect("second");
        assert_eq!((first, second, calls), (7, 7, 1));
    }

    #[test]
    fn cached_does_not_store_failures() {
        let cell: OnceCell<i32> = OnceCell::new();
        assert!(cached(&cell, || Err(RunnerError::NoOutputStream)).is_err());
        assert_eq!(cached(&cell, || Ok(3)).expect("retry"), 3);
    }

    #[test]
    fn group_reports_bad_numbers_as_parse_failures() {
        let re = Regex::new(r"(\S+)").expect("regex");
        let caps = re.captures("abc").expect("captures");
        let err = group::<f64>(&caps, 1, "FIND", "abc").unwrap_err();
        assert!(err.is_parse_failure());
        assert!(err.to_string().contains("abc"));
    }
}
