#![allow(clippy::module_name_repetitions)]
//! External-process execution: capture-and-return or streamed with
//! per-stream line forwarding.
//!
//! Streaming uses one OS thread per child pipe so that neither stream can
//! fill its pipe buffer while the other is being drained. Start and wait are
//! separate steps: `run_and_stream` returns a [`StreamHandle`] the caller
//! must wait on, otherwise the child leaks.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::color::{color_enabled_stderr, log_info_stderr};
use crate::errors::{Error, Result};
use crate::util::shell_join;

/// One external invocation: program, ordered args, optional working
/// directory, dry-run flag. Immutable once handed to a runner.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    dry_run: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            dry_run: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn argv(&self) -> &[String] {
        &self.args
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Copy-pasteable shell rendering for the logging side channel.
    pub fn preview(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        shell_join(&parts)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref dir) = self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Captured output of a completed command. Stderr of a failed command rides
/// in [`Error::CommandFailed`] instead, so success and failure diagnostics
/// cannot be mixed up.
#[derive(Debug, Default)]
pub struct CommandResult {
    pub stdout: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// Receives one line at a time while a streamed child runs. Called from two
/// reader threads, so implementations must be Send + Sync. Per-stream order
/// matches the child's output order; there is no ordering between streams.
pub trait LineSink: Send + Sync {
    fn line(&self, kind: StreamKind, line: &str);
}

/// Default sink: forward every line to stderr as it arrives.
pub struct LogSink;

impl LineSink for LogSink {
    fn line(&self, _kind: StreamKind, line: &str) {
        eprintln!("{line}");
    }
}

/// Seam over command issuance so the image cache and the kubectl/git
/// wrappers can be driven by a scripted runner in tests.
pub trait Runner {
    fn capture(&self, spec: &CommandSpec) -> Result<CommandResult>;

    /// Start, forward all output to `sink`, and wait for exit.
    fn stream_to(&self, spec: &CommandSpec, sink: Arc<dyn LineSink>) -> Result<()>;
}

/// Runner backed by real host processes.
pub struct ProcessRunner;

impl ProcessRunner {
    fn report(spec: &CommandSpec) {
        let use_err = color_enabled_stderr();
        if spec.is_dry_run() {
            log_info_stderr(
                use_err,
                &format!("devstack: dry-run, skipping: {}", spec.preview()),
            );
        } else {
            log_info_stderr(use_err, &format!("devstack: running: {}", spec.preview()));
        }
    }

    /// Launch the process, wait for termination, capture output.
    ///
    /// Dry-run performs no execution and returns an empty success result;
    /// the command line is still reported.
    pub fn run_and_capture(&self, spec: &CommandSpec) -> Result<CommandResult> {
        Self::report(spec);
        if spec.is_dry_run() {
            return Ok(CommandResult::default());
        }
        let out = spec.command().output().map_err(|e| Error::SpawnFailed {
            program: spec.program().to_string(),
            source: e,
        })?;
        if !out.status.success() {
            return Err(Error::CommandFailed {
                program: spec.program().to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            });
        }
        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
        })
    }

    /// Start the process with stdout and stderr attached to independent,
    /// concurrently-running line readers that push to `sink`.
    ///
    /// Dry-run returns `Ok(None)` without starting a process. The caller
    /// owns the returned handle and must call [`StreamHandle::wait`].
    pub fn run_and_stream(
        &self,
        spec: &CommandSpec,
        sink: Arc<dyn LineSink>,
    ) -> Result<Option<StreamHandle>> {
        Self::report(spec);
        if spec.is_dry_run() {
            return Ok(None);
        }
        let mut cmd = spec.command();
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = cmd.spawn().map_err(|e| Error::SpawnFailed {
            program: spec.program().to_string(),
            source: e,
        })?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::StreamSetupFailed {
                program: spec.program().to_string(),
                stream: "stdout",
            });
        };
        let Some(stderr) = child.stderr.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::StreamSetupFailed {
                program: spec.program().to_string(),
                stream: "stderr",
            });
        };

        let readers = vec![
            spawn_line_reader(StreamKind::Stdout, stdout, Arc::clone(&sink)),
            spawn_line_reader(StreamKind::Stderr, stderr, sink),
        ];
        Ok(Some(StreamHandle {
            program: spec.program().to_string(),
            child,
            readers,
        }))
    }
}

impl Runner for ProcessRunner {
    fn capture(&self, spec: &CommandSpec) -> Result<CommandResult> {
        self.run_and_capture(spec)
    }

    fn stream_to(&self, spec: &CommandSpec, sink: Arc<dyn LineSink>) -> Result<()> {
        match self.run_and_stream(spec, sink)? {
            Some(handle) => handle.wait(),
            None => Ok(()),
        }
    }
}

/// A started streamed child. Waiting blocks until exit; nonzero exit
/// surfaces here (not at start) as CommandFailed.
pub struct StreamHandle {
    program: String,
    child: Child,
    readers: Vec<JoinHandle<()>>,
}

impl StreamHandle {
    pub fn wait(mut self) -> Result<()> {
        // Readers finish at EOF on their pipes, which happens at or before
        // process exit; join them first so every produced line reached the
        // sink before success/failure is decided.
        for r in self.readers {
            let _ = r.join();
        }
        let status = self.child.wait().map_err(Error::Io)?;
        if !status.success() {
            return Err(Error::CommandFailed {
                program: self.program,
                // stderr already went to the sink line by line
                stderr: format!("exit status {}", status.code().unwrap_or(-1)),
            });
        }
        Ok(())
    }
}

fn spawn_line_reader<R>(kind: StreamKind, pipe: R, sink: Arc<dyn LineSink>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut reader = BufReader::with_capacity(64 * 1024, pipe);
        // read_until grows the buffer as needed, so a single line may be
        // arbitrarily long (wrapped JSON blobs easily exceed a megabyte).
        let mut buf: Vec<u8> = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
                        buf.pop();
                    }
                    let line = String::from_utf8_lossy(&buf);
                    sink.line(kind, &line);
                }
                Err(_) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_preview_escapes() {
        let spec = CommandSpec::new("git")
            .arg("log")
            .arg("--pretty=format:a b");
        assert_eq!(spec.preview(), "git log '--pretty=format:a b'");
    }

    #[test]
    fn test_dry_run_capture_is_empty_success() {
        let spec = CommandSpec::new("definitely-not-a-binary").dry_run(true);
        let out = ProcessRunner.run_and_capture(&spec).unwrap();
        assert!(out.stdout.is_empty());
    }

    #[test]
    fn test_dry_run_stream_starts_nothing() {
        let spec = CommandSpec::new("definitely-not-a-binary").dry_run(true);
        let handle = ProcessRunner.run_and_stream(&spec, Arc::new(LogSink)).unwrap();
        assert!(handle.is_none());
    }

    #[test]
    fn test_spawn_failure_maps_to_spawn_failed() {
        let spec = CommandSpec::new("devstack-no-such-binary-xyz");
        match ProcessRunner.run_and_capture(&spec) {
            Err(Error::SpawnFailed { program, .. }) => {
                assert_eq!(program, "devstack-no-such-binary-xyz");
            }
            other => panic!("expected SpawnFailed, got {other:?}"),
        }
    }
}
