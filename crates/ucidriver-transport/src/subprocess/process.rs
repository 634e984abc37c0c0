//! Process management for the engine subprocess

use crate::error::{ProcessError, Result};
use crate::subprocess::pipes::{self, HostPipes};
use crate::traits::{OutputStream, Transport};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// How long the engine gets to honor `quit` before it is killed
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// How long to wait for a killed engine to be reaped
pub const KILL_REAP_TIMEOUT: Duration = Duration::from_millis(200);

const QUIT: &str = "quit";

/// Lifecycle of a [`ProcessHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Pipes exist, child not yet spawned
    Created,
    /// Child spawned, streams live
    Running,
    /// Shut down (terminal)
    Closed,
}

/// Result of the one and only shutdown, replayed to every `close` caller
#[derive(Debug, Clone)]
enum CloseOutcome {
    Clean,
    Exited(ExitStatus),
    WaitFailed(String),
    ForceKilled,
}

impl CloseOutcome {
    fn to_result(&self, path: &Path) -> Result<()> {
        match self {
            Self::Clean => Ok(()),
            Self::Exited(status) => Err(ProcessError::Shutdown {
                path: path.to_path_buf(),
                status: *status,
            }),
            Self::WaitFailed(reason) => Err(ProcessError::Wait {
                path: path.to_path_buf(),
                reason: reason.clone(),
            }),
            Self::ForceKilled => Err(ProcessError::ForceKilled {
                path: path.to_path_buf(),
                grace: SHUTDOWN_GRACE,
            }),
        }
    }
}

/// State guarded by the handle's mutex
#[derive(Debug)]
struct Inner {
    state: ProcessState,
    /// Prepared command; owns the child ends of the pipes until spawn
    command: Option<Command>,
    /// Host ends, waiting for registration at start
    host_pipes: Option<HostPipes>,
    child: Option<Child>,
    pid: Option<u32>,
    stdout: Option<pipe::Receiver>,
    stderr: Option<pipe::Receiver>,
}

/// Handle to a UCI engine process and its three standard streams
///
/// The pipes are created together with the handle. [`start`](Self::start)
/// spawns the child at most once; [`close`](Self::close) asks it to `quit`
/// and kills it if it has not exited within [`SHUTDOWN_GRACE`].
#[derive(Debug)]
pub struct ProcessHandle {
    path: PathBuf,
    inner: Mutex<Inner>,
    /// Input sink. Its lock serializes writers so lines never interleave.
    stdin: tokio::sync::Mutex<Option<pipe::Sender>>,
    shutdown: OnceCell<CloseOutcome>,
}

impl ProcessHandle {
    /// Validate `path` and prepare the engine command with its pipes.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::Config`] for an empty path
    /// - [`ProcessError::NotFound`] when nothing exists at `path`
    /// - [`ProcessError::NotAFile`] when `path` is a directory
    /// - [`ProcessError::AccessDenied`] when `path` cannot be inspected
    /// - [`ProcessError::PipeCreate`] when a pipe cannot be created; pipes
    ///   created before the failure are released first
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(ProcessError::config("engine path cannot be empty"));
        }
        check_engine_path(&path)?;

        let (host_pipes, child_pipes) = pipes::create(&path)?;
        let (stdin, stdout, stderr) = child_pipes.into_stdio();

        let mut command = Command::new(&path);
        command
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true);

        debug!(path = %path.display(), "Prepared engine command");

        Ok(Self {
            inner: Mutex::new(Inner {
                state: ProcessState::Created,
                command: Some(command),
                host_pipes: Some(host_pipes),
                child: None,
                pid: None,
                stdout: None,
                stderr: None,
            }),
            stdin: tokio::sync::Mutex::new(None),
            shutdown: OnceCell::new(),
            path,
        })
    }

    /// Path of the engine binary
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current lifecycle state
    pub fn state(&self) -> ProcessState {
        self.lock_inner().state
    }

    /// OS process id, once the child has been spawned
    pub fn pid(&self) -> Option<u32> {
        self.lock_inner().pid
    }

    /// Check if the child is still running
    pub fn is_alive(&self) -> bool {
        let mut inner = self.lock_inner();
        match inner.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Spawn the engine.
    ///
    /// On failure the three pipes are released and the handle is closed.
    pub async fn start(&self) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        let sink = self.launch()?;
        *stdin = Some(sink);
        Ok(())
    }

    fn launch(&self) -> Result<pipe::Sender> {
        let mut inner = self.lock_inner();
        match inner.state {
            ProcessState::Running => {
                return Err(ProcessError::AlreadyStarted {
                    path: self.path.clone(),
                });
            }
            ProcessState::Closed => {
                return Err(ProcessError::Closed {
                    path: self.path.clone(),
                });
            }
            ProcessState::Created => {}
        }

        let (Some(mut command), Some(host_pipes)) =
            (inner.command.take(), inner.host_pipes.take())
        else {
            inner.state = ProcessState::Closed;
            return Err(ProcessError::Closed {
                path: self.path.clone(),
            });
        };

        let spawned = command.spawn();
        // The parent's copies of the child ends must go, or the output pipe never reaches EOF
        drop(command);

        let child = match spawned {
            Ok(child) => child,
            Err(source) => {
                inner.state = ProcessState::Closed;
                drop(host_pipes);
                warn!(path = %self.path.display(), error = %source, "Failed to spawn engine");
                return Err(ProcessError::Spawn {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let pipes = match host_pipes.register() {
            Ok(pipes) => pipes,
            Err(source) => {
                // kill_on_drop takes the child down with it
                inner.state = ProcessState::Closed;
                drop(child);
                return Err(ProcessError::Spawn {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let pid = child.id();
        info!(pid = ?pid, path = %self.path.display(), "Engine spawned");

        inner.pid = pid;
        inner.child = Some(child);
        inner.stdout = Some(pipes.stdout);
        inner.stderr = Some(pipes.stderr);
        inner.state = ProcessState::Running;
        Ok(pipes.stdin)
    }

    /// Write `line` followed by a newline to the engine's standard input.
    ///
    /// Fails when the engine is not running.
    pub async fn write_line(&self, line: &str) -> Result<()> {
        match self.state() {
            ProcessState::Running => self.write_raw(line).await,
            ProcessState::Created => Err(ProcessError::input_unavailable(
                &self.path,
                "engine has not been started",
            )),
            ProcessState::Closed => Err(ProcessError::input_unavailable(
                &self.path,
                "either stdin pipe or process is closed",
            )),
        }
    }

    async fn write_raw(&self, line: &str) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        let Some(sink) = stdin.as_mut() else {
            return Err(ProcessError::input_unavailable(
                &self.path,
                "stdin pipe is closed",
            ));
        };

        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        sink.write_all(&buf)
            .await
            .map_err(|source| ProcessError::Write {
                path: self.path.clone(),
                source,
            })
    }

    /// Take the engine's standard output. Available once, after start.
    pub fn take_stdout(&self) -> Option<pipe::Receiver> {
        self.lock_inner().stdout.take()
    }

    /// Take the engine's standard error. Available once, after start.
    ///
    /// Nothing drains it otherwise; a chatty engine can block once the pipe
    /// buffer fills.
    pub fn take_stderr(&self) -> Option<pipe::Receiver> {
        self.lock_inner().stderr.take()
    }

    /// Shut the engine down: send `quit`, wait up to [`SHUTDOWN_GRACE`],
    /// then kill it.
    ///
    /// Only the first call does any work; every call (including concurrent
    /// ones) returns the first call's outcome. Pipes are always released.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::Shutdown`] if the engine exited unsuccessfully
    /// - [`ProcessError::Wait`] if its exit status could not be collected
    /// - [`ProcessError::ForceKilled`] if it ignored `quit`
    pub async fn close(&self) -> Result<()> {
        self.shutdown
            .get_or_init(|| self.shutdown_once())
            .await
            .to_result(&self.path)
    }

    async fn shutdown_once(&self) -> CloseOutcome {
        let (child, pid) = {
            let mut inner = self.lock_inner();
            inner.state = ProcessState::Closed;
            inner.command = None;
            inner.host_pipes = None;
            (inner.child.take(), inner.pid)
        };

        let outcome = match child {
            Some(child) => self.stop_child(child, pid).await,
            None => {
                debug!(path = %self.path.display(), "Closing engine that was never started");
                CloseOutcome::Clean
            }
        };

        self.release_pipes().await;
        outcome
    }

    async fn stop_child(&self, mut child: Child, pid: Option<u32>) -> CloseOutcome {
        let cooperative = async {
            if let Err(e) = self.write_raw(QUIT).await {
                debug!(pid = ?pid, error = %e, "quit was not delivered");
            }
            child.wait().await
        };
        let result = tokio::time::timeout(SHUTDOWN_GRACE, cooperative).await;

        match result {
            Ok(Ok(status)) if status.success() => {
                info!(pid = ?pid, "Engine exited");
                CloseOutcome::Clean
            }
            Ok(Ok(status)) => {
                warn!(pid = ?pid, %status, "Engine exited with an error during shutdown");
                CloseOutcome::Exited(status)
            }
            Ok(Err(e)) => CloseOutcome::WaitFailed(e.to_string()),
            Err(_) => {
                warn!(pid = ?pid, grace = ?SHUTDOWN_GRACE, "Engine ignored quit, killing");
                // still owned and unreaped, so the pid cannot have been reused
                if let Err(e) = child.start_kill() {
                    warn!(pid = ?pid, error = %e, "Failed to send SIGKILL");
                }
                match tokio::time::timeout(KILL_REAP_TIMEOUT, child.wait()).await {
                    Ok(Ok(status)) => debug!(pid = ?pid, %status, "Killed engine reaped"),
                    _ => warn!(pid = ?pid, "Killed engine was not reaped in time"),
                }
                CloseOutcome::ForceKilled
            }
        }
    }

    async fn release_pipes(&self) {
        self.stdin.lock().await.take();
        let mut inner = self.lock_inner();
        inner.stdout = None;
        inner.stderr = None;
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn check_engine_path(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Err(ProcessError::NotAFile {
            path: path.to_path_buf(),
        }),
        Ok(_) => Ok(()),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            Err(ProcessError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(ProcessError::AccessDenied {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[async_trait]
impl Transport for ProcessHandle {
    fn path(&self) -> &Path {
        ProcessHandle::path(self)
    }

    async fn start(&self) -> Result<()> {
        ProcessHandle::start(self).await
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        ProcessHandle::write_line(self, line).await
    }

    fn take_output(&self) -> Option<OutputStream> {
        self.take_stdout()
            .map(|stdout| Box::new(stdout) as OutputStream)
    }

    async fn close(&self) -> Result<()> {
        ProcessHandle::close(self).await
    }
}
