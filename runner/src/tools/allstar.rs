//! ALLSTAR command builder.
//!
//! ALLSTAR handles one image per process: it lists its options, takes
//! overrides until an empty line, then asks for the input and output files.
//! The options step is queued in front of the fitting step.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::io::config::RunnerConfig;
use crate::io::workdir::{WorkingDirectory, expand_path};
use crate::results::{AllstarOptionsResult, AllstarResult, option_key};
use crate::runner::{Position, Runner, RunnerSettings};
use crate::tools::files::{self, ALLSTAR_OPT, DEFAULT_ALLSTAR_OPT, stage_opt_file};

/// Results of one ALLSTAR round.
#[derive(Debug, Clone)]
pub struct AllstarRun {
    pub options: AllstarOptionsResult,
    pub result: AllstarResult,
}

/// Files of one ALLSTAR run; the image falls back to the default image, then `i.fits`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllstarFiles {
    pub image: Option<String>,
    pub psf: String,
    pub stars: String,
    pub profile_photometry: String,
    /// Subtracted image, not produced when `None`.
    pub subtracted_image: Option<String>,
}

impl Default for AllstarFiles {
    fn default() -> Self {
        Self {
            image: None,
            psf: files::PSF.to_string(),
            stars: files::APERTURE_PHOTOMETRY.to_string(),
            profile_photometry: files::PROFILE_PHOTOMETRY.to_string(),
            subtracted_image: None,
        }
    }
}

/// Drives one `allstar` process per round in its own working directory.
#[derive(Debug)]
pub struct Allstar {
    runner: Runner,
    image: Option<PathBuf>,
    options: BTreeMap<String, f64>,
}

impl Allstar {
    pub fn new(
        config: &RunnerConfig,
        workdir: Option<WorkingDirectory>,
        image: Option<&Path>,
        batch: bool,
    ) -> Result<Self> {
        let settings = RunnerSettings::from_config(config, &config.allstar);
        let runner = Runner::new(settings, workdir, batch)?;
        stage_opt_file(
            &runner,
            config.files.allstar_opt.as_deref(),
            ALLSTAR_OPT,
            DEFAULT_ALLSTAR_OPT,
        )?;
        let image = image.map(expand_path).transpose()?;
        // Progress animation garbles captured output.
        let options = BTreeMap::from([("WA".to_string(), 0.0)]);
        Ok(Self {
            runner,
            image,
            options,
        })
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub fn runner_mut(&mut self) -> &mut Runner {
        &mut self.runner
    }

    pub fn image(&self) -> Option<&Path> {
        self.image.as_deref()
    }

    pub fn set_image(&mut self, image: Option<&Path>) -> Result<()> {
        self.image = image.map(expand_path).transpose()?;
        Ok(())
    }

    /// Overrides sent before every run, keyed by two-letter code.
    pub fn options(&self) -> &BTreeMap<String, f64> {
        &self.options
    }

    /// Set (or with `None`, unset) an override kept for later runs.
    pub fn set_option(&mut self, name: &str, value: Option<f64>) {
        let key = option_key(name);
        match value {
            Some(value) => {
                self.options.insert(key, value);
            }
            None => {
                self.options.remove(&key);
            }
        }
    }

    /// Replace `allstar.opt` with the given file.
    pub fn options_file(&mut self, path: &Path) -> Result<()> {
        self.runner.link_in(path, Some(ALLSTAR_OPT)).map(|_| ())
    }

    fn options_text(&self) -> String {
        let mut text: String = self
            .options
            .iter()
            .map(|(key, value)| format!("{key}={value:.2}\n"))
            .collect();
        text.push('\n');
        text
    }

    /// Queue the fit of `files`, preceded by the option overrides.
    pub fn allstar(&mut self, files: &AllstarFiles) -> Result<AllstarRun> {
        if !self.runner.prepare_for_commands()? {
            warn!("discarding queued ALLSTAR run, one run per process");
            self.runner.reset()?;
        }

        let image = match (&files.image, &self.image) {
            (Some(image), _) => image.clone(),
            (None, Some(default)) => default.to_string_lossy().into_owned(),
            (None, None) => files::IMAGE.to_string(),
        };
        let image = self.runner.prepare_input_file(&image)?;
        let psf = self.runner.prepare_input_file(&files.psf)?;
        let stars = self.runner.prepare_input_file(&files.stars)?;
        let profile = self.runner.prepare_output_file(&files.profile_photometry)?;
        let subtracted = self
            .runner
            .prepare_output_file(files.subtracted_image.as_deref().unwrap_or_default())?;

        // A blank last line declines the subtracted image.
        let text = format!(
            "{}\n{}\n{}\n{}\n{}\n",
            image.local, psf.local, stars.local, profile.local, subtracted.local
        );

        let result: AllstarResult = self.runner.push(&text, Position::Back)?;
        let options: AllstarOptionsResult =
            self.runner.push(&self.options_text(), Position::Front)?;
        debug!(image = %image.local, "queued ALLSTAR");
        self.runner.run_if_immediate()?;
        Ok(AllstarRun { options, result })
    }

    pub fn run(&mut self, wait: bool) -> Result<()> {
        self.runner.run(wait)
    }

    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            runner: self.runner.try_clone()?,
            image: self.image.clone(),
            options: self.options.clone(),
        })
    }

    pub fn close(self) -> Result<()> {
        self.runner.close()
    }
}
