//! One external-process lifecycle bound to one working directory.
//!
//! A [`Runner`] collects logical commands into a script and hands every
//! command back as a typed result. Each round (script, output chain, process,
//! promised output files) lives in a [`Session`] shared with the results it
//! produced, so reading a result forces that round to finish even when the
//! caller never called [`Runner::run`], and a reset never invalidates results
//! of earlier rounds.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::chain::{NodeId, OutputChain};
use crate::core::phase::Phase;
use crate::core::script::CommandScript;
use crate::error::{Result, RunnerError};
use crate::io::config::{RunnerConfig, ToolConfig};
use crate::io::process::ProcessController;
use crate::io::workdir::{
    WorkingDirectory, copy_out_of, expand_path, is_bare_name, local_name_for,
};
use crate::results::{CommandResult, ResultHandle};

/// By-value configuration of one runner; clones copy it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub raise_on_nonzero_exit: bool,
    /// Bound on how long a non-blocking `run` waits for the process.
    pub poll_timeout: Duration,
    /// Appended to every script right before the process starts.
    pub epilogue: String,
    pub tmp_prefix: String,
}

impl RunnerSettings {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            raise_on_nonzero_exit: true,
            poll_timeout: Duration::from_millis(10),
            epilogue: String::new(),
            tmp_prefix: "photrunner_".to_string(),
        }
    }

    pub fn from_config(config: &RunnerConfig, tool: &ToolConfig) -> Self {
        Self {
            executable: tool.executable_path(),
            args: tool.args.clone(),
            raise_on_nonzero_exit: config.raise_on_nonzero_exit,
            poll_timeout: config.poll_timeout(),
            epilogue: String::new(),
            tmp_prefix: config.tmp_prefix.clone(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_epilogue(mut self, epilogue: impl Into<String>) -> Self {
        self.epilogue = epilogue.into();
        self
    }

    pub fn with_raise_on_nonzero_exit(mut self, raise: bool) -> Self {
        self.raise_on_nonzero_exit = raise;
        self
    }
}

/// Where a new step goes relative to what is already queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Back,
    Front,
}

/// A file prepared for one command: name inside the working directory plus
/// the caller-facing absolute path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedFile {
    pub local: String,
    pub absolute: PathBuf,
}

impl StagedFile {
    /// True when no file was requested.
    pub fn is_none(&self) -> bool {
        self.local.is_empty()
    }
}

/// State of one round: everything `reset` replaces.
#[derive(Debug)]
pub(crate) struct Session {
    process: ProcessController,
    script: CommandScript,
    chain: OutputChain,
    external_outputs: BTreeSet<PathBuf>,
    harvested: bool,
    /// Promised outputs that could not be copied out, reported by `run` and `wait_for_results`.
    harvest_failures: Vec<String>,
    workdir: PathBuf,
    raise_on_nonzero_exit: bool,
    poll_timeout: Duration,
    epilogue: String,
    launches: Rc<Cell<usize>>,
}

impl Session {
    fn new(settings: &RunnerSettings, workdir: &Path, launches: Rc<Cell<usize>>) -> Self {
        Self {
            process: ProcessController::new(&settings.executable, &settings.args, workdir),
            script: CommandScript::new(),
            chain: OutputChain::new(),
            external_outputs: BTreeSet::new(),
            harvested: false,
            harvest_failures: Vec::new(),
            workdir: workdir.to_path_buf(),
            raise_on_nonzero_exit: settings.raise_on_nonzero_exit,
            poll_timeout: settings.poll_timeout,
            epilogue: settings.epilogue.clone(),
            launches,
        }
    }

    fn phase(&self) -> Phase {
        self.process.phase()
    }

    fn is_fresh(&self) -> bool {
        self.chain.is_empty() && self.script.is_empty()
    }

    fn start(&mut self) -> Result<()> {
        let mut text = self.script.as_str().to_string();
        text.push_str(&self.epilogue);
        self.process.start(&text)?;
        self.launches.set(self.launches.get() + 1);
        Ok(())
    }

    fn poll(&mut self) -> Result<()> {
        if self.process.poll(self.poll_timeout)? {
            self.settle()?;
        }
        Ok(())
    }

    /// Bring the round to Finished, starting it if it is still queued.
    pub(crate) fn ensure_finished(&mut self) -> Result<()> {
        match self.phase() {
            Phase::Idle => {
                if self.script.is_empty() {
                    return Err(RunnerError::NotRun {
                        executable: self.process.executable_name(),
                    });
                }
                self.start()?;
                self.process.wait()?;
            }
            Phase::Running => {
                self.process.wait()?;
            }
            Phase::Finished => {}
        }
        self.settle()
    }

    /// Attach captured output to the chain once, harvest promised files, check the exit code.
    ///
    /// Harvest failures are recorded, never returned: a result read must not
    /// fail because another command's output file is missing.
    fn settle(&mut self) -> Result<()> {
        let Some(output) = self.process.captured() else {
            return Ok(());
        };
        let code = output.exit_code;
        if !self.chain.has_source() {
            let stdout = output.stdout.clone();
            self.chain.attach_source(stdout);
            if code != 0 {
                warn!(
                    executable = %self.process.executable_name(),
                    exit_code = code,
                    "process finished with error code"
                );
            }
        }
        if !self.harvested && (code == 0 || !self.raise_on_nonzero_exit) {
            self.harvest_outputs();
        }
        if code != 0 && self.raise_on_nonzero_exit {
            let stderr = self
                .process
                .captured()
                .map(|output| output.stderr.clone())
                .unwrap_or_default();
            return Err(RunnerError::ProcessExit {
                executable: self.process.executable_name(),
                code,
                stderr,
            });
        }
        Ok(())
    }

    /// Copy every promised output out, carrying on past failures.
    fn harvest_outputs(&mut self) {
        self.harvested = true;
        for absolute in &self.external_outputs {
            let local = local_name_for(absolute);
            match copy_out_of(&self.workdir, &local, absolute) {
                Ok(_) => {
                    debug!(local = %local, dest = %absolute.display(), "copied output file out of working directory");
                }
                Err(err) => {
                    warn!(local = %local, dest = %absolute.display(), err = %err, "promised output not copied");
                    self.harvest_failures.push(err.to_string());
                }
            }
        }
    }

    fn harvest_result(&self) -> Result<()> {
        if self.harvest_failures.is_empty() {
            return Ok(());
        }
        Err(RunnerError::OutputsNotCopied {
            failures: self.harvest_failures.clone(),
        })
    }

    /// Text claimed by `node`, finishing the round first.
    pub(crate) fn consume(&mut self, node: NodeId) -> Result<String> {
        self.ensure_finished()?;
        Ok(self.chain.consume(node)?.to_string())
    }
}

/// Drives one external tool through one working directory, round after round.
///
/// In immediate mode (`batch == false`) every logical command appended with
/// [`append`](Runner::append) or [`prepend`](Runner::prepend) runs right away;
/// in batch mode commands accumulate until [`run`](Runner::run) or until a
/// result is read.
#[derive(Debug)]
pub struct Runner {
    settings: RunnerSettings,
    workdir: WorkingDirectory,
    session: Rc<RefCell<Session>>,
    launches: Rc<Cell<usize>>,
    batch: bool,
}

impl Runner {
    /// Bind a runner to `workdir`, or to a fresh temporary directory when `None`.
    pub fn new(
        settings: RunnerSettings,
        workdir: Option<WorkingDirectory>,
        batch: bool,
    ) -> Result<Self> {
        let workdir = match workdir {
            Some(workdir) => workdir,
            None => WorkingDirectory::temporary(&settings.tmp_prefix)?,
        };
        let launches = Rc::new(Cell::new(0));
        let session = Session::new(&settings, workdir.path(), Rc::clone(&launches));
        Ok(Self {
            settings,
            workdir,
            session: Rc::new(RefCell::new(session)),
            launches,
            batch,
        })
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    pub fn workdir(&self) -> &WorkingDirectory {
        &self.workdir
    }

    pub fn is_batch(&self) -> bool {
        self.batch
    }

    pub fn set_batch(&mut self, batch: bool) {
        self.batch = batch;
    }

    /// Opt out of (or back into) failing on non-zero exit codes, current round included.
    pub fn set_raise_on_nonzero_exit(&mut self, raise: bool) {
        self.settings.raise_on_nonzero_exit = raise;
        self.session.borrow_mut().raise_on_nonzero_exit = raise;
    }

    pub fn phase(&self) -> Phase {
        self.session.borrow().phase()
    }

    /// Commands are queued but no process was started yet.
    pub fn is_ready_to_run(&self) -> bool {
        let session = self.session.borrow();
        session.phase() == Phase::Idle && !session.script.is_empty()
    }

    /// Started and output not collected yet, even if the process already exited.
    pub fn is_running(&self) -> bool {
        self.phase() == Phase::Running
    }

    pub fn has_finished(&self) -> bool {
        self.phase() == Phase::Finished
    }

    /// Script queued for the current round, without the epilogue.
    pub fn pending_script(&self) -> String {
        self.session.borrow().script.as_str().to_string()
    }

    pub fn output(&self) -> Option<String> {
        let session = self.session.borrow();
        session.process.captured().map(|output| output.stdout.clone())
    }

    pub fn stderr(&self) -> Option<String> {
        let session = self.session.borrow();
        session.process.captured().map(|output| output.stderr.clone())
    }

    pub fn exit_code(&self) -> Option<i32> {
        let session = self.session.borrow();
        session.process.captured().map(|output| output.exit_code)
    }

    /// Number of processes this runner has started.
    pub fn launch_count(&self) -> usize {
        self.launches.get()
    }

    /// Make the runner accept commands: wait for a running round and reset a
    /// finished one.
    ///
    /// Returns true when the round is fresh (nothing queued yet), which is
    /// when tool wrappers queue their per-round startup steps.
    pub fn prepare_for_commands(&mut self) -> Result<bool> {
        let phase = self.phase();
        match phase {
            Phase::Idle => {}
            Phase::Running => {
                let waited = self.session.borrow_mut().ensure_finished();
                self.start_new_round();
                waited?;
            }
            Phase::Finished => self.start_new_round(),
        }
        Ok(self.session.borrow().is_fresh())
    }

    /// Queue `text` with a result parser without running anything.
    pub fn push<R: CommandResult>(&mut self, text: &str, position: Position) -> Result<R> {
        self.prepare_for_commands()?;
        let node = {
            let mut session = self.session.borrow_mut();
            match position {
                Position::Back => {
                    session.script.append(text);
                    session.chain.push_back(R::COMMAND, R::terminator())
                }
                Position::Front => {
                    session.script.prepend(text);
                    session.chain.push_front(R::COMMAND, R::terminator())
                }
            }
        };
        debug!(command = R::COMMAND, ?position, "queued command");
        Ok(R::from_handle(ResultHandle::new(
            Rc::clone(&self.session),
            node,
        )))
    }

    /// Queue a command at the end; runs it at once in immediate mode.
    pub fn append<R: CommandResult>(&mut self, text: &str) -> Result<R> {
        let result = self.push(text, Position::Back)?;
        self.run_if_immediate()?;
        Ok(result)
    }

    /// Queue a command before everything queued so far; runs at once in immediate mode.
    pub fn prepend<R: CommandResult>(&mut self, text: &str) -> Result<R> {
        let result = self.push(text, Position::Front)?;
        self.run_if_immediate()?;
        Ok(result)
    }

    /// Queue raw input without a result; never runs.
    pub fn append_text(&mut self, text: &str) -> Result<()> {
        self.prepare_for_commands()?;
        self.session.borrow_mut().script.append(text);
        Ok(())
    }

    pub fn prepend_text(&mut self, text: &str) -> Result<()> {
        self.prepare_for_commands()?;
        self.session.borrow_mut().script.prepend(text);
        Ok(())
    }

    /// Run the queued script to completion unless in batch mode.
    ///
    /// Output files that could not be copied out are not reported here, so
    /// the command that was just queued still hands back its result; they
    /// surface from [`run`](Runner::run) and
    /// [`wait_for_results`](Runner::wait_for_results).
    pub fn run_if_immediate(&mut self) -> Result<()> {
        if self.batch {
            Ok(())
        } else {
            self.advance(true)
        }
    }

    /// Start the queued script.
    ///
    /// With `wait`, blocks until output is captured. Without it, the process
    /// is started and given `poll_timeout` to finish; a process that is still
    /// busy stays running without error.
    ///
    /// Once the round has finished, promised output files that could not be
    /// copied out are reported as [`RunnerError::OutputsNotCopied`].
    pub fn run(&mut self, wait: bool) -> Result<()> {
        self.advance(wait)?;
        self.session.borrow().harvest_result()
    }

    fn advance(&mut self, wait: bool) -> Result<()> {
        let mut session = self.session.borrow_mut();
        match session.phase() {
            Phase::Idle if session.script.is_empty() => {
                debug!("nothing queued, not starting");
                Ok(())
            }
            Phase::Idle => {
                session.start()?;
                if wait {
                    session.ensure_finished()
                } else {
                    session.poll()
                }
            }
            Phase::Running if wait => session.ensure_finished(),
            Phase::Running | Phase::Finished => Ok(()),
        }
    }

    /// Block until the current round's output is captured, starting it if queued.
    pub fn wait_for_results(&mut self) -> Result<()> {
        let mut session = self.session.borrow_mut();
        session.ensure_finished()?;
        session.harvest_result()
    }

    /// Drop the current round's script, chain and output; the directory stays.
    pub fn reset(&mut self) -> Result<()> {
        let phase = self.phase();
        if phase == Phase::Running {
            return Err(RunnerError::InvalidState {
                operation: "reset",
                phase: phase.as_str(),
            });
        }
        self.start_new_round();
        Ok(())
    }

    fn start_new_round(&mut self) {
        let session = Session::new(&self.settings, self.workdir.path(), Rc::clone(&self.launches));
        self.session = Rc::new(RefCell::new(session));
        debug!(dir = %self.workdir.path().display(), "started new round");
    }

    /// Independent runner with a copy of this one's directory and settings and
    /// an empty script.
    pub fn try_clone(&self) -> Result<Self> {
        let phase = self.phase();
        if phase == Phase::Running {
            return Err(RunnerError::InvalidState {
                operation: "clone",
                phase: phase.as_str(),
            });
        }
        let workdir = self.workdir.duplicate()?;
        info!(from = %self.workdir.path().display(), to = %workdir.path().display(), "cloned runner");
        Self::new(self.settings.clone(), Some(workdir), self.batch)
    }

    /// Terminate a running process and remove an owned directory.
    pub fn close(mut self) -> Result<()> {
        self.terminate();
        self.workdir.close()
    }

    fn terminate(&mut self) {
        if let Ok(mut session) = self.session.try_borrow_mut() {
            session.process.kill();
        }
    }

    // Working-directory files.

    pub fn resolve(&self, local: &str) -> PathBuf {
        self.workdir.resolve(local)
    }

    pub fn absolute_path(&self, path: &Path) -> Result<PathBuf> {
        self.workdir.absolute_path(path)
    }

    pub fn exists(&self, local: &str) -> bool {
        self.workdir.exists(local)
    }

    pub fn copy_in(&self, source: &Path, local: Option<&str>) -> Result<String> {
        self.workdir.copy_in(source, local)
    }

    pub fn link_in(&self, source: &Path, local: Option<&str>) -> Result<String> {
        self.workdir.link_in(source, local)
    }

    pub fn write_file(&self, local: &str, contents: &str) -> Result<()> {
        self.workdir.write(local, contents)
    }

    pub fn copy_out(&self, local: &str, dest: &Path) -> Result<PathBuf> {
        self.workdir.copy_out(local, dest)
    }

    pub fn link_out(&self, local: &str, dest: &Path) -> Result<PathBuf> {
        self.workdir.link_out(local, dest)
    }

    pub fn remove(&self, local: &str) -> Result<()> {
        self.workdir.remove(local)
    }

    /// Make `path` readable by the tool.
    ///
    /// Files outside the directory are symlinked in under a hashed local name,
    /// except when the same path is a promised output of this round.
    pub fn prepare_input_file(&mut self, path: &str) -> Result<StagedFile> {
        self.prepare_io_file(path, false)
    }

    /// Make `path` writable by the tool.
    ///
    /// Files outside the directory become promises copied out after the run.
    /// The local file is removed so the tool never asks about overwriting.
    pub fn prepare_output_file(&mut self, path: &str) -> Result<StagedFile> {
        self.prepare_io_file(path, true)
    }

    fn prepare_io_file(&mut self, path: &str, output: bool) -> Result<StagedFile> {
        if path.is_empty() {
            return Ok(StagedFile::default());
        }
        self.prepare_for_commands()?;

        let mut path = PathBuf::from(path);
        let expanded = expand_path(&path)?;
        if expanded.parent() == Some(self.workdir.path()) {
            if let Some(name) = expanded.file_name() {
                path = PathBuf::from(name);
            }
        }

        let staged = if is_bare_name(&path) {
            let local = path.to_string_lossy().into_owned();
            StagedFile {
                absolute: self.workdir.resolve(&local),
                local,
            }
        } else {
            let local = local_name_for(&expanded);
            let mut session = self.session.borrow_mut();
            if output {
                session.external_outputs.insert(expanded.clone());
            } else if !session.external_outputs.contains(&expanded) {
                if !expanded.exists() {
                    return Err(RunnerError::MissingInput { path: expanded });
                }
                self.workdir.link_in(&expanded, Some(&local))?;
                debug!(local = %local, source = %expanded.display(), "linked input file into working directory");
            }
            StagedFile {
                local,
                absolute: expanded,
            }
        };

        if output {
            self.workdir.remove(&staged.local)?;
        }
        Ok(staged)
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::results::PromptResult;

    /// A "tool" that echoes its script back, so every step's text is its own output.
    fn echo_runner(batch: bool) -> Runner {
        let settings = RunnerSettings::new("sh").with_args(["-c", "cat"]);
        Runner::new(settings, None, batch).expect("runner")
    }

    #[test]
    fn batch_mode_queues_until_run() {
        let mut runner = echo_runner(true);
        let first: PromptResult = runner.append("one\nCommand:\n").expect("append");
        let second: PromptResult = runner.append("two\nCommand:\n").expect("append");
        assert!(runner.is_ready_to_run());
        assert_eq!(runner.launch_count(), 0);

        runner.run(true).expect("run");
        assert!(runner.has_finished());
        assert_eq!(first.buffer().expect("first"), "one\nCommand:\n");
        assert_eq!(second.buffer().expect("second"), "two\nCommand:\n");
        assert_eq!(runner.launch_count(), 1);
    }

    #[test]
    fn immediate_mode_runs_each_command() {
        let mut runner = echo_runner(false);
        let first: PromptResult = runner.append("one\nCommand:\n").expect("append");
        assert!(runner.has_finished());
        let second: PromptResult = runner.append("two\nCommand:\n").expect("append");
        assert_eq!(runner.launch_count(), 2);
        assert_eq!(first.buffer().expect("first"), "one\nCommand:\n");
        assert_eq!(second.buffer().expect("second"), "two\nCommand:\n");
    }

    #[test]
    fn reading_a_result_runs_the_queued_script() {
        let mut runner = echo_runner(true);
        let result: PromptResult = runner.append("x\nCommand:\n").expect("append");
        assert_eq!(result.buffer().expect("buffer"), "x\nCommand:\n");
        assert!(runner.has_finished());
    }

    #[test]
    fn prepend_puts_text_and_node_first() {
        let mut runner = echo_runner(true);
        let queued: PromptResult = runner.append("queued\nCommand:\n").expect("append");
        let front: PromptResult = runner.prepend("front\nCommand:\n").expect("prepend");
        assert_eq!(runner.pending_script(), "front\nCommand:\nqueued\nCommand:\n");
        assert_eq!(queued.buffer().expect("queued"), "queued\nCommand:\n");
        assert_eq!(front.buffer().expect("front"), "front\nCommand:\n");
    }

    #[test]
    fn epilogue_is_sent_but_not_queued() {
        let settings = RunnerSettings::new("sh")
            .with_args(["-c", "cat"])
            .with_epilogue("EXIT\n");
        let mut runner = Runner::new(settings, None, true).expect("runner");
        runner.append_text("ATTACH\n").expect("text");
        assert_eq!(runner.pending_script(), "ATTACH\n");
        runner.run(true).expect("run");
        assert_eq!(runner.output().as_deref(), Some("ATTACH\nEXIT\n"));
    }

    #[test]
    fn wait_without_any_script_is_not_run() {
        let mut runner = echo_runner(true);
        let err = runner.wait_for_results().unwrap_err();
        assert!(matches!(err, RunnerError::NotRun { .. }));
    }

    #[test]
    fn nonzero_exit_raises_unless_disabled() {
        let settings = RunnerSettings::new("sh").with_args(["-c", "cat; echo broken >&2; exit 2"]);
        let mut runner = Runner::new(settings, None, true).expect("runner");
        let result: PromptResult = runner.append("a\nCommand:\n").expect("append");
        let err = runner.run(true).unwrap_err();
        match err {
            RunnerError::ProcessExit { code, stderr, .. } => {
                assert_eq!(code, 2);
                assert_eq!(stderr, "broken\n");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(result.buffer().unwrap_err().is_process_failure());

        runner.set_raise_on_nonzero_exit(false);
        assert_eq!(result.buffer().expect("buffer"), "a\nCommand:\n");
        assert_eq!(runner.exit_code(), Some(2));
    }

    #[test]
    fn reset_while_running_is_rejected() {
        let settings = RunnerSettings::new("sh").with_args(["-c", "sleep 1; cat"]);
        let mut runner = Runner::new(settings, None, true).expect("runner");
        runner.append_text("x\n").expect("text");
        runner.run(false).expect("start");
        assert!(runner.is_running());
        assert!(matches!(
            runner.reset().unwrap_err(),
            RunnerError::InvalidState { operation: "reset", .. }
        ));
        assert!(matches!(
            runner.try_clone().unwrap_err(),
            RunnerError::InvalidState { operation: "clone", .. }
        ));
        runner.wait_for_results().expect("wait");
        runner.reset().expect("reset after finish");
        assert!(!runner.is_ready_to_run());
    }

    #[test]
    fn local_paths_are_used_as_is() {
        let mut runner = echo_runner(true);
        let staged = runner.prepare_input_file("i.fits").expect("input");
        assert_eq!(staged.local, "i.fits");
        assert_eq!(staged.absolute, runner.resolve("i.fits"));

        let inside = runner.resolve("i.coo");
        runner.write_file("i.coo", "old").expect("write");
        let staged = runner
            .prepare_output_file(&inside.to_string_lossy())
            .expect("output");
        assert_eq!(staged.local, "i.coo");
        assert!(!runner.exists("i.coo"));

        assert!(runner.prepare_input_file("").expect("empty").is_none());
    }

    #[test]
    fn external_input_is_linked_under_hashed_name() {
        let outside = tempfile::tempdir().expect("tempdir");
        let source = outside.path().join("night.coo");
        std::fs::write(&source, "stars").expect("write");

        let mut runner = echo_runner(true);
        let staged = runner
            .prepare_input_file(&source.to_string_lossy())
            .expect("input");
        assert_eq!(staged.local, local_name_for(&source));
        assert_eq!(
            std::fs::read_to_string(runner.resolve(&staged.local)).expect("read"),
            "stars"
        );

        let missing = outside.path().join("missing.coo");
        let err = runner
            .prepare_input_file(&missing.to_string_lossy())
            .unwrap_err();
        assert!(err.is_staging_failure());
    }

    #[test]
    fn promised_output_is_not_linked_as_input() {
        let outside = tempfile::tempdir().expect("tempdir");
        let target = outside.path().join("result.ap");

        let mut runner = echo_runner(true);
        let out = runner
            .prepare_output_file(&target.to_string_lossy())
            .expect("output");
        let input = runner
            .prepare_input_file(&target.to_string_lossy())
            .expect("same path as input");
        assert_eq!(out.local, input.local);
        assert!(!runner.exists(&input.local));
    }
}
