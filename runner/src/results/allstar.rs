//! Results of an ALLSTAR run: the option listing up to the first file
//! prompt, then the fitting report to the end of the stream.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::chain::Terminator;
use crate::error::{Result, RunnerError};
use crate::results::daophot::{lookup_option, parse_options};
use crate::results::{CommandResult, ResultHandle, cached, group};

static INPUT_IMAGE_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Input image name:").unwrap());

// Iteration table rows: four integer columns.
static STARS_ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) +(\d+) +(\d+) +(\d+) *\n").unwrap());

#[derive(Debug, Clone)]
pub struct AllstarOptionsResult {
    handle: ResultHandle,
    options: OnceCell<BTreeMap<String, f64>>,
}

impl AllstarOptionsResult {
    pub fn options(&self) -> Result<BTreeMap<String, f64>> {
        cached(&self.options, || {
            parse_options(Self::COMMAND, self.buffer()?, "WA")
        })
    }

    pub fn get(&self, name: &str) -> Result<f64> {
        let options = self.options()?;
        lookup_option(&options, Self::COMMAND, name, self.buffer()?)
    }
}

impl CommandResult for AllstarOptionsResult {
    const COMMAND: &'static str = "ALLSTAR OPTIONS";

    fn terminator() -> Terminator {
        Terminator::Pattern(INPUT_IMAGE_PROMPT.clone())
    }

    fn from_handle(handle: ResultHandle) -> Self {
        Self {
            handle,
            options: OnceCell::new(),
        }
    }

    fn handle(&self) -> &ResultHandle {
        &self.handle
    }

    fn check(&self) -> Result<()> {
        self.options().map(|_| ())
    }
}

#[derive(Debug, Clone)]
pub struct AllstarResult {
    handle: ResultHandle,
    stars: OnceCell<(u32, u32)>,
}

impl AllstarResult {
    /// `(disappeared, converged)` star counts from the final table row.
    pub fn stars_no(&self) -> Result<(u32, u32)> {
        cached(&self.stars, || {
            let buffer = self.buffer()?;
            let caps = STARS_ROW_RE.captures_iter(buffer).last().ok_or_else(|| {
                RunnerError::parse(Self::COMMAND, "no star count table", buffer)
            })?;
            Ok((
                group(&caps, 3, Self::COMMAND, buffer)?,
                group(&caps, 4, Self::COMMAND, buffer)?,
            ))
        })
    }

    pub fn disappeared(&self) -> Result<u32> {
        self.stars_no().map(|(disappeared, _)| disappeared)
    }

    pub fn converged(&self) -> Result<u32> {
        self.stars_no().map(|(_, converged)| converged)
    }
}

impl CommandResult for AllstarResult {
    const COMMAND: &'static str = "ALLSTAR";

    fn terminator() -> Terminator {
        Terminator::EndOfStream
    }

    fn from_handle(handle: ResultHandle) -> Self {
        Self {
            handle,
            stars: OnceCell::new(),
        }
    }

    fn handle(&self) -> &ResultHandle {
        &self.handle
    }

    fn check(&self) -> Result<()> {
        self.stars_no().map(|_| ())
    }
}
