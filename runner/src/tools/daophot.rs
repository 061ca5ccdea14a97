//! DAOPHOT command builder.
//!
//! Each method formats the answers DAOPHOT expects at its prompts, stages the
//! files involved and queues the command on the underlying [`Runner`]. Every
//! fresh round starts with the option listing DAOPHOT prints on startup and,
//! when a default image is set, an `ATTACH` of that image, so commands issued
//! in immediate mode always find the image attached.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::io::config::RunnerConfig;
use crate::io::workdir::{WorkingDirectory, expand_path};
use crate::results::{
    AttachResult, CommandResult, FindResult, OptionsResult, PhotometryResult, PickResult,
    PromptResult, PsfResult,
};
use crate::runner::{Position, Runner, RunnerSettings};
use crate::tools::files::{
    DAOPHOT_OPT, DEFAULT_DAOPHOT_OPT, DEFAULT_PHOTO_OPT, PHOTO_OPT, stage_opt_file,
};

/// Sky annulus and aperture radii overriding `photo.opt` for one `PHOTOMETRY`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Apertures {
    pub inner_sky: Option<f64>,
    pub outer_sky: Option<f64>,
    /// Up to twelve radii, sent as `A1`..`AC`.
    pub radii: Vec<f64>,
}

impl Apertures {
    fn overrides(&self) -> String {
        let mut text: String = self
            .radii
            .iter()
            .enumerate()
            .map(|(index, radius)| format!("A{:X}={radius:.2}\n", index + 1))
            .collect();
        if let Some(inner) = self.inner_sky {
            text.push_str(&format!("IS={inner:.2}\n"));
        }
        if let Some(outer) = self.outer_sky {
            text.push_str(&format!("OS={outer:.2}\n"));
        }
        text
    }
}

/// Drives one `daophot` process per round in its own working directory.
#[derive(Debug)]
pub struct Daophot {
    runner: Runner,
    image: Option<PathBuf>,
    startup_options: Option<OptionsResult>,
}

impl Daophot {
    /// New runner with `daophot.opt` and `photo.opt` staged in its directory.
    pub fn new(
        config: &RunnerConfig,
        workdir: Option<WorkingDirectory>,
        image: Option<&Path>,
        batch: bool,
    ) -> Result<Self> {
        let settings = RunnerSettings::from_config(config, &config.daophot).with_epilogue("EXIT\n");
        let runner = Runner::new(settings, workdir, batch)?;
        stage_opt_file(
            &runner,
            config.files.daophot_opt.as_deref(),
            DAOPHOT_OPT,
            DEFAULT_DAOPHOT_OPT,
        )?;
        stage_opt_file(
            &runner,
            config.files.photo_opt.as_deref(),
            PHOTO_OPT,
            DEFAULT_PHOTO_OPT,
        )?;
        let image = image.map(expand_path).transpose()?;
        Ok(Self {
            runner,
            image,
            startup_options: None,
        })
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub fn runner_mut(&mut self) -> &mut Runner {
        &mut self.runner
    }

    /// Image attached automatically at the start of every round.
    pub fn image(&self) -> Option<&Path> {
        self.image.as_deref()
    }

    pub fn set_image(&mut self, image: Option<&Path>) -> Result<()> {
        self.image = image.map(expand_path).transpose()?;
        Ok(())
    }

    /// Options DAOPHOT listed when the current round's process started.
    pub fn startup_options(&self) -> Option<&OptionsResult> {
        self.startup_options.as_ref()
    }

    /// Get ready for a command; on a fresh round queue the startup steps.
    ///
    /// Returns the automatic `ATTACH` result when one was queued.
    fn begin(&mut self) -> Result<Option<AttachResult>> {
        if !self.runner.prepare_for_commands()? {
            return Ok(None);
        }
        self.startup_options = Some(self.runner.push("", Position::Back)?);
        match self.image.clone() {
            Some(image) => {
                let text = self.attach_text(&image)?;
                Ok(Some(self.runner.push(&text, Position::Back)?))
            }
            None => Ok(None),
        }
    }

    fn attach_text(&mut self, image: &Path) -> Result<String> {
        let staged = self.runner.prepare_input_file(&image.to_string_lossy())?;
        Ok(format!("ATTACH\n{}\n", staged.local))
    }

    fn command<R: CommandResult>(&mut self, text: &str) -> Result<R> {
        debug!(command = R::COMMAND, "daophot command");
        self.runner.append(text)
    }

    /// Attach `image` and make it the default for later rounds.
    pub fn attach(&mut self, image: &Path) -> Result<AttachResult> {
        let image = expand_path(image)?;
        self.image = Some(image.clone());
        if let Some(attached) = self.begin()? {
            self.runner.run_if_immediate()?;
            return Ok(attached);
        }
        let text = self.attach_text(&image)?;
        self.command(&text)
    }

    /// Set options from `(name, value)` pairs; names may be spelled out.
    pub fn options(&mut self, overrides: &[(&str, f64)]) -> Result<OptionsResult> {
        self.begin()?;
        let mut text = String::from("OPT\n\n");
        for (name, value) in overrides {
            text.push_str(&format!("{name}={value:.2}\n"));
        }
        text.push('\n');
        self.command(&text)
    }

    /// Load options from a `daophot.opt`-formatted file.
    pub fn options_file(&mut self, path: &Path) -> Result<OptionsResult> {
        self.begin()?;
        let staged = self.runner.prepare_input_file(&path.to_string_lossy())?;
        self.command(&format!("OPT\n{}\n\n", staged.local))
    }

    pub fn find(&mut self, frames_av: u32, frames_sum: u32, starlist: &str) -> Result<FindResult> {
        self.begin()?;
        let out = self.runner.prepare_output_file(starlist)?;
        self.command(&format!(
            "FIND\n{frames_av},{frames_sum}\n{}\nyes\n",
            out.local
        ))
    }

    pub fn photometry(
        &mut self,
        apertures: &Apertures,
        stars: &str,
        output: &str,
    ) -> Result<PhotometryResult> {
        self.begin()?;
        let input = self.runner.prepare_input_file(stars)?;
        let out = self.runner.prepare_output_file(output)?;
        self.command(&format!(
            "PHOT\n{PHOTO_OPT}\n{}\n{}\n{}\n",
            apertures.overrides(),
            input.local,
            out.local
        ))
    }

    /// Pick up to `count` PSF candidates brighter than `faintest_mag`.
    pub fn pick(
        &mut self,
        photometry: &str,
        count: u32,
        faintest_mag: f64,
        output: &str,
    ) -> Result<PickResult> {
        self.begin()?;
        let input = self.runner.prepare_input_file(photometry)?;
        let out = self.runner.prepare_output_file(output)?;
        self.command(&format!(
            "PICK\n{}\n{count},{faintest_mag}\n{}\n",
            input.local, out.local
        ))
    }

    pub fn psf(&mut self, photometry: &str, psf_stars: &str, output: &str) -> Result<PsfResult> {
        self.begin()?;
        let phot = self.runner.prepare_input_file(photometry)?;
        let stars = self.runner.prepare_input_file(psf_stars)?;
        let out = self.runner.prepare_output_file(output)?;
        // DAOPHOT also writes a neighbours file named after the PSF.
        let neighbours = Path::new(&out.local).with_extension("nei");
        self.runner.remove(&neighbours.to_string_lossy())?;
        self.command(&format!(
            "PSF\n{}\n{}\n{}\n",
            phot.local, stars.local, out.local
        ))
    }

    /// Subtract the stars in `photometry`, optionally keeping those listed in `leave_in`.
    pub fn substar(
        &mut self,
        psf: &str,
        photometry: &str,
        leave_in: Option<&str>,
        output: &str,
    ) -> Result<PromptResult> {
        self.begin()?;
        let psf = self.runner.prepare_input_file(psf)?;
        let phot = self.runner.prepare_input_file(photometry)?;
        let mut text = format!("SUBSTAR\n{}\n{}\n", psf.local, phot.local);
        match leave_in {
            Some(leave_in) => {
                let leave = self.runner.prepare_input_file(leave_in)?;
                text.push_str(&format!("y\n{}\n", leave.local));
            }
            None => text.push_str("n\n"),
        }
        let out = self.runner.prepare_output_file(output)?;
        text.push_str(&out.local);
        text.push('\n');
        self.command(&text)
    }

    pub fn group(
        &mut self,
        photometry: &str,
        psf: &str,
        critical_overlap: f64,
        output: &str,
    ) -> Result<PromptResult> {
        self.begin()?;
        let phot = self.runner.prepare_input_file(photometry)?;
        let psf = self.runner.prepare_input_file(psf)?;
        let out = self.runner.prepare_output_file(output)?;
        self.command(&format!(
            "GROUP\n{}\n{}\n{critical_overlap:.2}\n{}\n",
            phot.local, psf.local, out.local
        ))
    }

    pub fn run(&mut self, wait: bool) -> Result<()> {
        self.runner.run(wait)
    }

    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            runner: self.runner.try_clone()?,
            image: self.image.clone(),
            startup_options: None,
        })
    }

    pub fn close(self) -> Result<()> {
        self.runner.close()
    }
}
