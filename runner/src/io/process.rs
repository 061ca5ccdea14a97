//! Owns one external process bound to a working directory.
//!
//! The script is written in full right after spawning, then stdin is closed.
//! Stdout and stderr are drained by reader threads from the moment the child
//! starts, so a chatty tool never blocks on a full pipe while nobody waits on
//! it. That is what makes "start many, then join many" safe over purely
//! synchronous process APIs.
//!
//! These two threads per started process are the one exception to the
//! runner starting no threads of its own. They only move bytes out of the
//! pipes; they never decide when a process starts or when a caller blocks.
//! Parallelism comes from starting several processes and joining them later.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::phase::Phase;
use crate::error::{IoContext, Result, RunnerError};

/// Output of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, or the negated signal number when killed by a signal.
    pub exit_code: i32,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug)]
struct RunningProcess {
    child: Child,
    stdout: thread::JoinHandle<io::Result<Vec<u8>>>,
    stderr: thread::JoinHandle<io::Result<Vec<u8>>>,
}

#[derive(Debug)]
enum ProcessState {
    Idle,
    Running(RunningProcess),
    Finished(CapturedOutput),
}

/// Spawns the executable in `workdir` and captures its output exactly once.
#[derive(Debug)]
pub struct ProcessController {
    executable: PathBuf,
    args: Vec<String>,
    workdir: PathBuf,
    state: ProcessState,
}

impl ProcessController {
    pub fn new(executable: &Path, args: &[String], workdir: &Path) -> Self {
        Self {
            executable: executable.to_path_buf(),
            args: args.to_vec(),
            workdir: workdir.to_path_buf(),
            state: ProcessState::Idle,
        }
    }

    pub fn executable_name(&self) -> String {
        self.executable.display().to_string()
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            ProcessState::Idle => Phase::Idle,
            ProcessState::Running(_) => Phase::Running,
            ProcessState::Finished(_) => Phase::Finished,
        }
    }

    pub fn captured(&self) -> Option<&CapturedOutput> {
        match &self.state {
            ProcessState::Finished(output) => Some(output),
            _ => None,
        }
    }

    /// Idle -> Running: spawn, start draining output, write the whole script.
    #[instrument(skip_all, fields(executable = %self.executable.display(), script_bytes = script.len()))]
    pub fn start(&mut self, script: &str) -> Result<()> {
        if !matches!(self.state, ProcessState::Idle) {
            return Err(RunnerError::InvalidState {
                operation: "start",
                phase: self.phase().as_str(),
            });
        }

        let mut cmd = Command::new(&self.executable);
        cmd.args(&self.args)
            .current_dir(&self.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(workdir = %self.workdir.display(), "spawning child process");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                error!(err = %source, "failed to spawn command; check the executable path in the config");
                return Err(RunnerError::Spawn {
                    executable: self.executable_name(),
                    source,
                });
            }
        };

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            kill_quietly(&mut child);
            return Err(RunnerError::Io {
                context: "take child output pipes".to_string(),
                source: io::Error::other("stdout/stderr were not piped"),
            });
        };
        let stdout = thread::spawn(move || read_stream(stdout));
        let stderr = thread::spawn(move || read_stream(stderr));

        debug!(stdin = script, "writing script");
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(script.as_bytes()) {
                Ok(()) => {}
                // The tool may exit before reading everything; its output still counts.
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    warn!("child closed stdin before the whole script was written");
                }
                Err(source) => {
                    kill_quietly(&mut child);
                    return Err(RunnerError::Io {
                        context: "write script to stdin".to_string(),
                        source,
                    });
                }
            }
        }

        info!(pid = child.id(), "process started");
        self.state = ProcessState::Running(RunningProcess {
            child,
            stdout,
            stderr,
        });
        Ok(())
    }

    /// Running -> Finished if the child exits within `timeout`; otherwise stays Running.
    ///
    /// Returns whether output is captured after the call.
    pub fn poll(&mut self, timeout: Duration) -> Result<bool> {
        let exited = match &mut self.state {
            ProcessState::Idle => return Ok(false),
            ProcessState::Finished(_) => return Ok(true),
            ProcessState::Running(running) => running
                .child
                .wait_timeout(timeout)
                .io_context(|| "poll child process".to_string())?,
        };
        match exited {
            Some(status) => {
                self.collect(status)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Running -> Finished, blocking until the child exits and both pipes hit EOF.
    #[instrument(skip_all, fields(executable = %self.executable.display()))]
    pub fn wait(&mut self) -> Result<&CapturedOutput> {
        if let ProcessState::Running(running) = &mut self.state {
            let status = running
                .child
                .wait()
                .io_context(|| "wait for child process".to_string())?;
            self.collect(status)?;
        }
        if matches!(self.state, ProcessState::Idle) {
            return Err(RunnerError::NotRun {
                executable: self.executable_name(),
            });
        }
        self.finished_output()
    }

    /// Forceful termination; the only cancellation this controller offers.
    pub fn kill(&mut self) {
        if let ProcessState::Running(running) = &mut self.state {
            warn!(pid = running.child.id(), "terminating running process");
            kill_quietly(&mut running.child);
            let status = running.child.wait();
            match status {
                Ok(status) => {
                    if let Err(e) = self.collect(status) {
                        warn!(err = %e, "failed to collect output of terminated process");
                    }
                }
                Err(e) => warn!(err = %e, "failed to reap terminated process"),
            }
        }
    }

    fn collect(&mut self, status: ExitStatus) -> Result<()> {
        let running = match std::mem::replace(&mut self.state, ProcessState::Idle) {
            ProcessState::Running(running) => running,
            other => {
                self.state = other;
                return Ok(());
            }
        };
        let stdout = join_output(running.stdout).io_context(|| "join stdout".to_string())?;
        let stderr = join_output(running.stderr).io_context(|| "join stderr".to_string())?;

        let output = CapturedOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code: exit_code(status),
        };
        debug!(stdout = %output.stdout, "captured output");
        info!(exit_code = output.exit_code, "process finished");
        self.state = ProcessState::Finished(output);
        Ok(())
    }

    fn finished_output(&self) -> Result<&CapturedOutput> {
        self.captured().ok_or(RunnerError::InvalidState {
            operation: "read output",
            phase: self.phase().as_str(),
        })
    }
}

impl Drop for ProcessController {
    fn drop(&mut self) {
        self.kill();
    }
}

fn kill_quietly(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(err = %e, "kill failed, process probably exited");
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    status.code().unwrap_or(-1)
}

fn join_output(handle: thread::JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(io::Error::other("output reader thread panicked")),
    }
}

fn read_stream<R: Read>(mut reader: R) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}
