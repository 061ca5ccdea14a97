//! Results of DAOPHOT commands. Every command's share ends at the next
//! `Command:` prompt.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::core::chain::Terminator;
use crate::error::{Result, RunnerError};
use crate::results::{CommandResult, ResultHandle, cached, command_prompt, group};

static PICTURE_SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Picture size:\s+(\d+)\s+(\d+)").unwrap());

// "FWHM OF OBJECT =     5.00   THRESHOLD (in sigmas) =     3.50"
static OPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\w\w)[^=\n]*=\s*(-?[0-9]+\.[0-9]*)").unwrap());

static FIND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"Sky mode and standard deviation = +(-?\d+\.\d*) +(-?\d+\.\d*)\n+ +",
        r"Clipped mean and median = +(-?\d+\.\d*)\s+(-?\d+\.\d*)\n +",
        r"Number of pixels used \(after clip\) = ([\d,]+)\n +",
        r"Relative error = +(-?\d+\.\d*)(?:\n.*)+\s",
        r"(\d+) stars",
    ))
    .unwrap()
});

static PHOT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"Estimated magnitude limit \(Aperture 1\): +(-?\d+\.\d*) +\+- +(-?\d+\.\d*) +per star",
    )
    .unwrap()
});

static PICK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) +suitable candidates").unwrap());

static PSF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Chi    Parameters...\n>* +(-?\d+\.\d*) +(-?\d+\.\d*) +(-?\d+\.\d*)").unwrap()
});

static PSF_ERRORS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" (\d+) +(\d+.\d+) [ ?*]").unwrap());

/// Two-letter option keys (`"FITTING RADIUS"` -> `"FI"`).
pub fn option_key(name: &str) -> String {
    name.chars().take(2).collect::<String>().to_uppercase()
}

/// Option listing as `key -> value`; `required` must be present for the
/// listing to count as printed.
pub(crate) fn parse_options(
    command: &'static str,
    buffer: &str,
    required: &str,
) -> Result<BTreeMap<String, f64>> {
    let mut options = BTreeMap::new();
    for caps in OPTION_RE.captures_iter(buffer) {
        let value: f64 = group(&caps, 2, command, buffer)?;
        options.insert(caps[1].to_uppercase(), value);
    }
    if !options.contains_key(required) {
        return Err(RunnerError::parse(
            command,
            format!("option listing without {required}"),
            buffer,
        ));
    }
    Ok(options)
}

pub(crate) fn lookup_option(
    options: &BTreeMap<String, f64>,
    command: &'static str,
    name: &str,
    buffer: &str,
) -> Result<f64> {
    let key = option_key(name);
    options
        .get(&key)
        .copied()
        .ok_or_else(|| RunnerError::parse(command, format!("option {key} not listed"), buffer))
}

/// Option listing, printed on startup and after every `OPTIONS` command.
#[derive(Debug, Clone)]
pub struct OptionsResult {
    handle: ResultHandle,
    options: OnceCell<BTreeMap<String, f64>>,
}

impl OptionsResult {
    /// All listed options keyed by their two-letter code.
    pub fn options(&self) -> Result<BTreeMap<String, f64>> {
        cached(&self.options, || {
            parse_options(Self::COMMAND, self.buffer()?, "RE")
        })
    }

    /// Value of one option; only the first two letters of `name` matter.
    pub fn get(&self, name: &str) -> Result<f64> {
        let options = self.options()?;
        lookup_option(&options, Self::COMMAND, name, self.buffer()?)
    }
}

impl CommandResult for OptionsResult {
    const COMMAND: &'static str = "OPTIONS";

    fn terminator() -> Terminator {
        command_prompt()
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
pub struct AttachResult {
    handle: ResultHandle,
    size: OnceCell<(u32, u32)>,
}

impl AttachResult {
    /// `(nx, ny)` of the attached image.
    pub fn picture_size(&self) -> Result<(u32, u32)> {
        cached(&self.size, || {
            let buffer = self.buffer()?;
            let caps = PICTURE_SIZE_RE.captures(buffer).ok_or_else(|| {
                RunnerError::parse(Self::COMMAND, "failed to attach image file", buffer)
            })?;
            Ok((
                group(&caps, 1, Self::COMMAND, buffer)?,
                group(&caps, 2, Self::COMMAND, buffer)?,
            ))
        })
    }
}

impl CommandResult for AttachResult {
    const COMMAND: &'static str = "ATTACH";

    fn terminator() -> Terminator {
        command_prompt()
    }

    fn from_handle(handle: ResultHandle) -> Self {
        Self {
            handle,
            size: OnceCell::new(),
        }
    }

    fn handle(&self) -> &ResultHandle {
        &self.handle
    }

    fn check(&self) -> Result<()> {
        self.picture_size().map(|_| ())
    }
}

/// Statistics printed by `FIND`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FindStats {
    pub sky: f64,
    pub stddev: f64,
    pub mean: f64,
    pub median: f64,
    pub pixels: u64,
    pub relative_error: f64,
    pub stars: u32,
}

#[derive(Debug, Clone)]
pub struct FindResult {
    handle: ResultHandle,
    stats: OnceCell<FindStats>,
}

impl FindResult {
    pub fn stats(&self) -> Result<FindStats> {
        cached(&self.stats, || {
            let buffer = self.buffer()?;
            let caps = FIND_RE
                .captures(buffer)
                .ok_or_else(|| RunnerError::parse(Self::COMMAND, "no statistics block", buffer))?;
            let pixels = caps[5].replace(',', "");
            let pixels = pixels.parse().map_err(|_| {
                RunnerError::parse(Self::COMMAND, format!("bad pixel count {pixels:?}"), buffer)
            })?;
            Ok(FindStats {
                sky: group(&caps, 1, Self::COMMAND, buffer)?,
                stddev: group(&caps, 2, Self::COMMAND, buffer)?,
                mean: group(&caps, 3, Self::COMMAND, buffer)?,
                median: group(&caps, 4, Self::COMMAND, buffer)?,
                pixels,
                relative_error: group(&caps, 6, Self::COMMAND, buffer)?,
                stars: group(&caps, 7, Self::COMMAND, buffer)?,
            })
        })
    }

    pub fn sky(&self) -> Result<f64> {
        self.stats().map(|s| s.sky)
    }

    pub fn stddev(&self) -> Result<f64> {
        self.stats().map(|s| s.stddev)
    }

    pub fn mean(&self) -> Result<f64> {
        self.stats().map(|s| s.mean)
    }

    pub fn median(&self) -> Result<f64> {
        self.stats().map(|s| s.median)
    }

    pub fn pixels(&self) -> Result<u64> {
        self.stats().map(|s| s.pixels)
    }

    pub fn relative_error(&self) -> Result<f64> {
        self.stats().map(|s| s.relative_error)
    }

    pub fn stars(&self) -> Result<u32> {
        self.stats().map(|s| s.stars)
    }
}

impl CommandResult for FindResult {
    const COMMAND: &'static str = "FIND";

    fn terminator() -> Terminator {
        command_prompt()
    }

    fn from_handle(handle: ResultHandle) -> Self {
        Self {
            handle,
            stats: OnceCell::new(),
        }
    }

    fn handle(&self) -> &ResultHandle {
        &self.handle
    }

    fn check(&self) -> Result<()> {
        self.stats().map(|_| ())
    }
}

#[derive(Debug, Clone)]
pub struct PhotometryResult {
    handle: ResultHandle,
    limit: OnceCell<(f64, f64)>,
}

impl PhotometryResult {
    /// Estimated magnitude limit in the first aperture and its error.
    pub fn magnitude_limit(&self) -> Result<(f64, f64)> {
        cached(&self.limit, || {
            let buffer = self.buffer()?;
            let caps = PHOT_RE.captures(buffer).ok_or_else(|| {
                RunnerError::parse(Self::COMMAND, "no magnitude limit estimate", buffer)
            })?;
            Ok((
                group(&caps, 1, Self::COMMAND, buffer)?,
                group(&caps, 2, Self::COMMAND, buffer)?,
            ))
        })
    }

    pub fn mag_limit(&self) -> Result<f64> {
        self.magnitude_limit().map(|(limit, _)| limit)
    }

    pub fn mag_err(&self) -> Result<f64> {
        self.magnitude_limit().map(|(_, err)| err)
    }
}

impl CommandResult for PhotometryResult {
    const COMMAND: &'static str = "PHOTOMETRY";

    fn terminator() -> Terminator {
        command_prompt()
    }

    fn from_handle(handle: ResultHandle) -> Self {
        Self {
            handle,
            limit: OnceCell::new(),
        }
    }

    fn handle(&self) -> &ResultHandle {
        &self.handle
    }

    fn check(&self) -> Result<()> {
        self.magnitude_limit().map(|_| ())
    }
}

#[derive(Debug, Clone)]
pub struct PickResult {
    handle: ResultHandle,
    stars: OnceCell<u32>,
}

impl PickResult {
    /// Number of suitable PSF candidates written.
    pub fn stars(&self) -> Result<u32> {
        cached(&self.stars, || {
            let buffer = self.buffer()?;
            let caps = PICK_RE.captures(buffer).ok_or_else(|| {
                RunnerError::parse(Self::COMMAND, "no candidate count", buffer)
            })?;
            group(&caps, 1, Self::COMMAND, buffer)
        })
    }
}

impl CommandResult for PickResult {
    const COMMAND: &'static str = "PICK";

    fn terminator() -> Terminator {
        command_prompt()
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
        self.stars().map(|_| ())
    }
}

/// Fit quality of a converged PSF.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PsfFit {
    pub chi: f64,
    pub hwhm_x: f64,
    pub hwhm_y: f64,
}

#[derive(Debug, Clone)]
pub struct PsfResult {
    handle: ResultHandle,
    fit: OnceCell<PsfFit>,
    errors: OnceCell<Vec<(u32, f64)>>,
}

impl PsfResult {
    pub fn fit(&self) -> Result<PsfFit> {
        cached(&self.fit, || {
            let buffer = self.buffer()?;
            let caps = PSF_RE
                .captures(buffer)
                .ok_or_else(|| RunnerError::parse(Self::COMMAND, "no chi line", buffer))?;
            Ok(PsfFit {
                chi: group(&caps, 1, Self::COMMAND, buffer)?,
                hwhm_x: group(&caps, 2, Self::COMMAND, buffer)?,
                hwhm_y: group(&caps, 3, Self::COMMAND, buffer)?,
            })
        })
    }

    /// False when the fit failed, including when the run itself failed.
    pub fn converged(&self) -> bool {
        self.fit().is_ok()
    }

    pub fn chi(&self) -> Result<f64> {
        self.fit().map(|fit| fit.chi)
    }

    pub fn hwhm_xy(&self) -> Result<(f64, f64)> {
        self.fit().map(|fit| (fit.hwhm_x, fit.hwhm_y))
    }

    /// `(star id, fit error)` for each PSF star listed.
    pub fn errors(&self) -> Result<Vec<(u32, f64)>> {
        cached(&self.errors, || {
            let buffer = self.buffer()?;
            PSF_ERRORS_RE
                .captures_iter(buffer)
                .map(|caps| {
                    Ok((
                        group(&caps, 1, Self::COMMAND, buffer)?,
                        group(&caps, 2, Self::COMMAND, buffer)?,
                    ))
                })
                .collect()
        })
    }
}

impl CommandResult for PsfResult {
    const COMMAND: &'static str = "PSF";

    fn terminator() -> Terminator {
        command_prompt()
    }

    fn from_handle(handle: ResultHandle) -> Self {
        Self {
            handle,
            fit: OnceCell::new(),
            errors: OnceCell::new(),
        }
    }

    fn handle(&self) -> &ResultHandle {
        &self.handle
    }

    fn check(&self) -> Result<()> {
        self.fit().map(|_| ())
    }
}
