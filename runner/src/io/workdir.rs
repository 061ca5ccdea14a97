//! Private working directory of one runner and file staging in/out of it.
//!
//! The driven tools have short path buffers and only address files relative
//! to their current directory, so every file that lives elsewhere is copied or
//! symlinked in under a short local name, and results are copied back out.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tracing::debug;

use crate::error::{IoContext, Result, RunnerError};

/// Directory the external process runs in.
///
/// Temporary directories are owned and removed on drop or [`close`]; a
/// caller-supplied directory is only borrowed and survives the runner.
///
/// [`close`]: WorkingDirectory::close
#[derive(Debug)]
pub struct WorkingDirectory {
    path: PathBuf,
    temp: Option<TempDir>,
    prefix: String,
}

impl WorkingDirectory {
    /// Create a fresh, owned temporary directory.
    pub fn temporary(prefix: &str) -> Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .io_context(|| format!("create temporary directory with prefix {prefix}"))?;
        let path = temp.path().to_path_buf();
        debug!(dir = %path.display(), "created working directory");
        Ok(Self {
            path,
            temp: Some(temp),
            prefix: prefix.to_string(),
        })
    }

    /// Use an existing directory (created if missing); it is never deleted.
    pub fn existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = expand_path(path.as_ref())?;
        fs::create_dir_all(&path).io_context(|| format!("create directory {}", path.display()))?;
        Ok(Self {
            path,
            temp: None,
            prefix: String::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_owned(&self) -> bool {
        self.temp.is_some()
    }

    /// Absolute in-directory path of `local`.
    pub fn resolve(&self, local: &str) -> PathBuf {
        self.path.join(local)
    }

    /// Bare file names resolve inside the directory; anything else is expanded.
    pub fn absolute_path(&self, path: &Path) -> Result<PathBuf> {
        if is_bare_name(path) {
            Ok(self.path.join(path))
        } else {
            expand_path(path)
        }
    }

    pub fn exists(&self, local: &str) -> bool {
        self.resolve(local).exists()
    }

    /// Copy `source` in as `local` (default: its base name), replacing any entry.
    pub fn copy_in(&self, source: &Path, local: Option<&str>) -> Result<String> {
        let source = expand_path(source)?;
        if !source.is_file() {
            return Err(RunnerError::MissingInput { path: source });
        }
        let local = local_or_base_name(&source, local)?;
        let dest = self.resolve(&local);
        remove_entry(&dest)?;
        fs::copy(&source, &dest)
            .io_context(|| format!("copy {} to {}", source.display(), dest.display()))?;
        debug!(local = %local, source = %source.display(), "copied into working directory");
        Ok(local)
    }

    /// Symlink `source` in as `local` (default: its base name), replacing any entry.
    pub fn link_in(&self, source: &Path, local: Option<&str>) -> Result<String> {
        let source = expand_path(source)?;
        if !source.exists() {
            return Err(RunnerError::MissingInput { path: source });
        }
        let local = local_or_base_name(&source, local)?;
        let dest = self.resolve(&local);
        remove_entry(&dest)?;
        symlink(&source, &dest)
            .io_context(|| format!("link {} as {}", source.display(), dest.display()))?;
        debug!(local = %local, source = %source.display(), "linked into working directory");
        Ok(local)
    }

    /// Write `contents` as `local`, replacing any entry.
    pub fn write(&self, local: &str, contents: &str) -> Result<()> {
        let dest = self.resolve(local);
        remove_entry(&dest)?;
        fs::write(&dest, contents).io_context(|| format!("write {}", dest.display()))
    }

    /// Copy `local` out to `dest`; a directory destination keeps the local name.
    pub fn copy_out(&self, local: &str, dest: &Path) -> Result<PathBuf> {
        copy_out_of(&self.path, local, dest)
    }

    /// Symlink `dest` at the in-directory `local`, replacing any entry at `dest`.
    pub fn link_out(&self, local: &str, dest: &Path) -> Result<PathBuf> {
        let source = self.existing_local(local)?;
        let dest = out_destination(dest, local)?;
        remove_entry(&dest)?;
        symlink(&source, &dest)
            .io_context(|| format!("link {} as {}", source.display(), dest.display()))?;
        Ok(dest)
    }

    /// Delete `local` if present.
    pub fn remove(&self, local: &str) -> Result<()> {
        remove_entry(&self.resolve(local))
    }

    /// Independent directory for a cloned runner.
    ///
    /// Owned directories are copied recursively (symlinks stay symlinks);
    /// borrowed directories are shared by path.
    pub fn duplicate(&self) -> Result<Self> {
        if !self.is_owned() {
            return Ok(Self {
                path: self.path.clone(),
                temp: None,
                prefix: String::new(),
            });
        }
        let copy = Self::temporary(&self.prefix)?;
        copy_dir_recursive(&self.path, copy.path())?;
        debug!(from = %self.path.display(), to = %copy.path.display(), "duplicated working directory");
        Ok(copy)
    }

    /// Tear down; removes the directory only when owned. Later calls are no-ops.
    pub fn close(&mut self) -> Result<()> {
        if let Some(temp) = self.temp.take() {
            let path = temp.path().to_path_buf();
            temp.close()
                .io_context(|| format!("remove working directory {}", path.display()))?;
        }
        Ok(())
    }

    fn existing_local(&self, local: &str) -> Result<PathBuf> {
        existing_local_in(&self.path, local)
    }
}

/// Copy `local` from `dir` out to `dest`; a directory destination keeps the local name.
pub(crate) fn copy_out_of(dir: &Path, local: &str, dest: &Path) -> Result<PathBuf> {
    let source = existing_local_in(dir, local)?;
    let dest = out_destination(dest, local)?;
    if dest.is_symlink() {
        remove_entry(&dest)?;
    }
    fs::copy(&source, &dest)
        .io_context(|| format!("copy {} to {}", source.display(), dest.display()))?;
    Ok(dest)
}

fn existing_local_in(dir: &Path, local: &str) -> Result<PathBuf> {
    let source = dir.join(local);
    if !source.exists() {
        return Err(RunnerError::MissingOutput {
            local: local.to_string(),
            dir: dir.to_path_buf(),
        });
    }
    Ok(source)
}

/// Short, collision-resistant local name for a file living outside the directory.
///
/// Six hex chars of the SHA-256 of the absolute path, then `_` and the base name.
pub fn local_name_for(absolute: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(absolute.to_string_lossy().as_bytes());
    let digest = hex::encode(hasher.finalize());
    let base = absolute
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}_{}", &digest[..6], base)
}

/// Expand a leading `~` and make the path absolute.
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let expanded = expand_home(path);
    std::path::absolute(&expanded).io_context(|| format!("resolve {}", expanded.display()))
}

pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest)),
        Err(_) => path.to_path_buf(),
    }
}

/// True for a single file name without any directory part.
pub fn is_bare_name(path: &Path) -> bool {
    let mut components = path.components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn local_or_base_name(source: &Path, local: Option<&str>) -> Result<String> {
    if let Some(local) = local {
        return Ok(local.to_string());
    }
    source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| RunnerError::MissingInput {
            path: source.to_path_buf(),
        })
}

fn out_destination(dest: &Path, local: &str) -> Result<PathBuf> {
    let dest = expand_path(dest)?;
    if dest.is_dir() {
        Ok(dest.join(local))
    } else {
        Ok(dest)
    }
}

fn remove_entry(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RunnerError::Io {
            context: format!("remove {}", path.display()),
            source: e,
        }),
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).io_context(|| format!("create {}", dst.display()))?;
    for entry in fs::read_dir(src).io_context(|| format!("read {}", src.display()))? {
        let entry = entry.io_context(|| format!("read entry in {}", src.display()))?;
        let path = entry.path();
        let target = dst.join(entry.file_name());
        let file_type = entry
            .file_type()
            .io_context(|| format!("stat {}", path.display()))?;
        if file_type.is_symlink() {
            let original =
                fs::read_link(&path).io_context(|| format!("read link {}", path.display()))?;
            symlink(&original, &target)
                .io_context(|| format!("link {}", target.display()))?;
        } else if file_type.is_dir() {
            copy_dir_recursive(&path, &target)?;
        } else {
            fs::copy(&path, &target).io_context(|| format!("copy {}", path.display()))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn symlink(original: &Path, link: &Path) -> io::Result<()> {
    if original.is_dir() {
        std::os::windows::fs::symlink_dir(original, link)
    } else {
        std::os::windows::fs::symlink_file(original, link)
    }
}
