//! `photrunner` command line: config bootstrap, a PSF pipeline and a
//! parallel fitting-radius sweep.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;

use photrunner::exit_codes;
use photrunner::io::config::{RunnerConfig, load_config, write_config};
use photrunner::logging;
use photrunner::pool::{clone_many, run_all};
use photrunner::results::{CommandResult, FindStats, PsfFit, PsfResult};
use photrunner::tools::files::{APERTURE_PHOTOMETRY, FOUND_STARS, PSF, PSF_STARS};
use photrunner::tools::{Apertures, Daophot};

#[derive(Parser)]
#[command(
    name = "photrunner",
    version,
    about = "Drive DAOPHOT and ALLSTAR through scripted runs"
)]
struct Cli {
    /// Config file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "photrunner.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a config file with default values.
    InitConfig {
        path: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Find stars, do aperture photometry and fit a PSF; print a JSON summary.
    Psf {
        image: PathBuf,
        /// Number of PSF candidates to pick.
        #[arg(long, default_value_t = 50)]
        candidates: u32,
        /// Faintest magnitude of PSF candidates.
        #[arg(long, default_value_t = 20.0)]
        faintest_mag: f64,
        /// Copy the fitted PSF here.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Fit one PSF per fitting radius, in parallel clones of one prepared run.
    Sweep {
        image: PathBuf,
        #[arg(long = "fitting-radius", required = true, num_args = 1..)]
        fitting_radius: Vec<f64>,
        /// Processes running at the same time.
        #[arg(long, default_value_t = 4)]
        parallel: usize,
        #[arg(long, default_value_t = 50)]
        candidates: u32,
        #[arg(long, default_value_t = 20.0)]
        faintest_mag: f64,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::for_error(&err)
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::InitConfig { path, force } => cmd_init_config(&path, force),
        Command::Psf {
            image,
            candidates,
            faintest_mag,
            out,
        } => {
            let config = load_config(&cli.config)?;
            cmd_psf(&config, &image, candidates, faintest_mag, out.as_deref())
        }
        Command::Sweep {
            image,
            fitting_radius,
            parallel,
            candidates,
            faintest_mag,
        } => {
            let config = load_config(&cli.config)?;
            cmd_sweep(
                &config,
                &image,
                &fitting_radius,
                parallel,
                candidates,
                faintest_mag,
            )
        }
    }
}

fn cmd_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &RunnerConfig::default())
}

#[derive(Debug, Serialize)]
struct PsfSummary {
    image: String,
    picture_size: (u32, u32),
    find: FindStats,
    mag_limit: f64,
    mag_err: f64,
    candidates: u32,
    converged: bool,
    fit: Option<PsfFit>,
    profile_errors: Vec<(u32, f64)>,
}

fn cmd_psf(
    config: &RunnerConfig,
    image: &Path,
    candidates: u32,
    faintest_mag: f64,
    out: Option<&Path>,
) -> Result<()> {
    let mut daophot = Daophot::new(config, None, None, true)?;
    let attach = daophot.attach(image)?;
    let find = daophot.find(1, 1, FOUND_STARS)?;
    let phot = daophot.photometry(&Apertures::default(), FOUND_STARS, APERTURE_PHOTOMETRY)?;
    let pick = daophot.pick(APERTURE_PHOTOMETRY, candidates, faintest_mag, PSF_STARS)?;
    let psf = daophot.psf(APERTURE_PHOTOMETRY, PSF_STARS, PSF)?;
    daophot.run(true).context("run daophot")?;

    let (mag_limit, mag_err) = phot.magnitude_limit()?;
    let summary = PsfSummary {
        image: image.display().to_string(),
        picture_size: attach.picture_size()?,
        find: find.stats()?,
        mag_limit,
        mag_err,
        candidates: pick.stars()?,
        converged: psf.converged(),
        fit: psf.fit().ok(),
        profile_errors: if psf.converged() { psf.errors()? } else { Vec::new() },
    };

    if let Some(out) = out {
        if !summary.converged {
            bail!("PSF did not converge, nothing to copy to {}", out.display());
        }
        daophot.runner().copy_out(PSF, out)?;
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    daophot.close()?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct SweepRow {
    fitting_radius: f64,
    converged: bool,
    chi: Option<f64>,
    error: Option<String>,
}

fn cmd_sweep(
    config: &RunnerConfig,
    image: &Path,
    radii: &[f64],
    parallel: usize,
    candidates: u32,
    faintest_mag: f64,
) -> Result<()> {
    let mut template = Daophot::new(config, None, Some(image), true)?;
    template.find(1, 1, FOUND_STARS)?;
    template.photometry(&Apertures::default(), FOUND_STARS, APERTURE_PHOTOMETRY)?;
    let pick = template.pick(APERTURE_PHOTOMETRY, candidates, faintest_mag, PSF_STARS)?;
    template.run(true).context("prepare PSF candidates")?;
    pick.check().context("pick PSF candidates")?;

    let mut workers = clone_many(&template, radii.len())?;
    let fits = workers
        .iter_mut()
        .zip(radii)
        .map(|(worker, radius)| {
            worker.options(&[("FI", *radius)])?;
            worker.psf(APERTURE_PHOTOMETRY, PSF_STARS, PSF)
        })
        .collect::<photrunner::Result<Vec<PsfResult>>>()?;

    let outcomes = run_all(&mut workers, parallel);
    let rows: Vec<SweepRow> = radii
        .iter()
        .zip(fits.iter().zip(outcomes))
        .map(|(radius, (fit, outcome))| match outcome.and_then(|()| fit.chi()) {
            Ok(chi) => SweepRow {
                fitting_radius: *radius,
                converged: true,
                chi: Some(chi),
                error: None,
            },
            Err(err) => SweepRow {
                fitting_radius: *radius,
                converged: false,
                chi: None,
                error: Some(err.to_string()),
            },
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&rows)?);
    for worker in workers {
        worker.close()?;
    }
    template.close()?;
    Ok(())
}
