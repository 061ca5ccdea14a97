//! Runner configuration stored as TOML (default `photrunner.toml`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::workdir::expand_home;

/// Runner configuration (TOML).
///
/// Edited by humans; missing fields fall back to defaults that expect
/// `daophot` and `allstar` on `PATH`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerConfig {
    pub daophot: ToolConfig,
    pub allstar: ToolConfig,
    pub files: OptFiles,

    /// How long a non-blocking `run` waits for the process before returning.
    pub poll_timeout_ms: u64,

    /// Treat any non-zero exit code as a failure.
    pub raise_on_nonzero_exit: bool,

    /// Prefix of temporary working directories.
    pub tmp_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolConfig {
    /// Executable name or path; `~` is expanded.
    pub executable: String,
    pub args: Vec<String>,
}

impl ToolConfig {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
        }
    }

    pub fn executable_path(&self) -> PathBuf {
        expand_home(Path::new(&self.executable))
    }
}

/// Option files copied into every fresh working directory.
///
/// Unset entries use the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OptFiles {
    pub daophot_opt: Option<PathBuf>,
    pub photo_opt: Option<PathBuf>,
    pub allstar_opt: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            daophot: ToolConfig::new("daophot"),
            allstar: ToolConfig::new("allstar"),
            files: OptFiles::default(),
            poll_timeout_ms: 10,
            raise_on_nonzero_exit: true,
            tmp_prefix: "photrunner_".to_string(),
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self::new("")
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, tool) in [("daophot", &self.daophot), ("allstar", &self.allstar)] {
            if tool.executable.trim().is_empty() {
                return Err(anyhow!("{name}.executable must be non-empty"));
            }
        }
        if self.poll_timeout_ms == 0 {
            return Err(anyhow!("poll_timeout_ms must be > 0"));
        }
        if self.tmp_prefix.contains(std::path::MAIN_SEPARATOR) {
            return Err(anyhow!("tmp_prefix must not contain a path separator"));
        }
        Ok(())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RunnerConfig::default()`.
pub fn load_config(path: &Path) -> Result<RunnerConfig> {
    if !path.exists() {
        let cfg = RunnerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunnerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RunnerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, RunnerConfig::default());
        assert_eq!(cfg.poll_timeout(), Duration::from_millis(10));
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested/photrunner.toml");
        let mut cfg = RunnerConfig::default();
        cfg.daophot.executable = "~/bin/daophot".to_string();
        cfg.files.photo_opt = Some(PathBuf::from("/data/photo.opt"));
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("photrunner.toml");
        fs::write(&path, "[allstar]\nexecutable = \"/opt/dao/allstar\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.allstar.executable, "/opt/dao/allstar");
        assert_eq!(cfg.daophot.executable, "daophot");
        assert!(cfg.raise_on_nonzero_exit);
    }

    #[test]
    fn zero_poll_timeout_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("photrunner.toml");
        fs::write(&path, "poll_timeout_ms = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("poll_timeout_ms"));
    }

    #[test]
    fn empty_executable_is_rejected() {
        let mut cfg = RunnerConfig::default();
        cfg.daophot.executable = "  ".to_string();
        assert!(cfg.validate().is_err());
    }
}
