//! Test-only stand-in for the DAOPHOT suite programs.
//!
//! A [`FakeTool`] is a `sh` script that records every launch, saves the
//! script it was sent and answers with canned output.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::io::config::{RunnerConfig, ToolConfig};
use crate::runner::RunnerSettings;

pub struct FakeTool {
    dir: TempDir,
    script: PathBuf,
}

impl FakeTool {
    /// Replays `output` on stdout and exits with `exit_code`.
    pub fn new(output: &str, exit_code: i32) -> Self {
        let dir = tempfile::tempdir().expect("fake tool dir");
        fs::write(dir.path().join("output.txt"), output).expect("write canned output");
        let body = format!("cat \"$fake_dir/output.txt\"\nexit {exit_code}\n");
        Self::with_dir(dir, &body)
    }

    /// Runs `body` after the launch is logged and stdin saved to `$fake_dir/stdin.log`.
    ///
    /// `$fake_dir` holds the fake's own directory; the current directory is
    /// the runner's working directory.
    pub fn scripted(body: &str) -> Self {
        let dir = tempfile::tempdir().expect("fake tool dir");
        Self::with_dir(dir, body)
    }

    fn with_dir(dir: TempDir, body: &str) -> Self {
        let script = dir.path().join("tool.sh");
        let text = format!(
            "fake_dir='{}'\necho \"$PWD\" >> \"$fake_dir/spawns.log\"\ncat > \"$fake_dir/stdin.log\"\n{body}",
            dir.path().display()
        );
        fs::write(&script, text).expect("write fake tool");
        Self { dir, script }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Settings running the fake through `sh`, so it needs no exec bit.
    pub fn settings(&self) -> RunnerSettings {
        RunnerSettings::new("sh").with_args([self.script.display().to_string()])
    }

    /// Config whose `daophot` and `allstar` both run the fake.
    pub fn config(&self) -> RunnerConfig {
        let tool = ToolConfig {
            executable: "sh".to_string(),
            args: vec![self.script.display().to_string()],
        };
        RunnerConfig {
            daophot: tool.clone(),
            allstar: tool,
            ..RunnerConfig::default()
        }
    }

    /// Number of processes started so far.
    pub fn launches(&self) -> usize {
        fs::read_to_string(self.dir.path().join("spawns.log"))
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }

    /// Working directories of all launches, in order.
    pub fn launch_dirs(&self) -> Vec<PathBuf> {
        fs::read_to_string(self.dir.path().join("spawns.log"))
            .map(|log| log.lines().map(PathBuf::from).collect())
            .unwrap_or_default()
    }

    /// Script received by the latest launch.
    pub fn last_stdin(&self) -> String {
        fs::read_to_string(self.dir.path().join("stdin.log")).unwrap_or_default()
    }
}

/// Typical DAOPHOT startup: option listing, then the prompt.
pub const DAOPHOT_BANNER: &str = "\
 READ NOISE (ADU; 1 frame) =     5.00     GAIN (e-/ADU; 1 frame) =    10.00
 FWHM OF OBJECT =     2.50   THRESHOLD (in sigmas) =     4.00
 FITTING RADIUS =     3.00       PSF RADIUS =    11.00

Command:";

/// `ATTACH` response for a 1250 x 1150 image.
pub const ATTACH_OK: &str = "\

 Your picture name is i.fits

    Picture size:   1250  1150

Command:";

/// `PSF` response that converged.
pub const PSF_OK: &str = "\
 Chi    Parameters...
>>   0.0333   1.50420   1.39658

 Profile errors:

   3  0.036       12  0.029 ?     41  0.071 *

Command:";

/// `PSF` response that did not converge.
pub const PSF_FAILED: &str = "\
 Failed to converge.

Command:";
