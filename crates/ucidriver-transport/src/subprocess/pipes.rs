//! Standard-stream pipes for the engine process
//!
//! All three pipes are created before the child exists. The child ends are
//! handed to the command; the host ends stay with the handle and are only
//! registered with the tokio reactor once the child has been spawned.

use crate::error::{ProcessError, Result, StreamKind};
use std::fs::File;
use std::io::{self, PipeReader, PipeWriter};
use std::os::fd::OwnedFd;
use std::path::Path;
use std::process::Stdio;
use tokio::net::unix::pipe;

/// Host ends of the three pipes, before registration with the runtime
#[derive(Debug)]
pub(crate) struct HostPipes {
    pub(crate) stdin: PipeWriter,
    pub(crate) stdout: PipeReader,
    pub(crate) stderr: PipeReader,
}

/// Child ends of the three pipes, consumed by the command
#[derive(Debug)]
pub(crate) struct ChildPipes {
    pub(crate) stdin: PipeReader,
    pub(crate) stdout: PipeWriter,
    pub(crate) stderr: PipeWriter,
}

impl ChildPipes {
    /// Convert into the `Stdio` triple passed to the command
    pub(crate) fn into_stdio(self) -> (Stdio, Stdio, Stdio) {
        (
            Stdio::from(self.stdin),
            Stdio::from(self.stdout),
            Stdio::from(self.stderr),
        )
    }
}

/// Create stdin, stdout and stderr pipes, in that order.
///
/// A failure drops every pipe created so far before the error is returned.
pub(crate) fn create(path: &Path) -> Result<(HostPipes, ChildPipes)> {
    let pipe_error = |stream: StreamKind| {
        move |source: io::Error| ProcessError::PipeCreate {
            stream,
            path: path.to_path_buf(),
            source,
        }
    };

    let (child_stdin, host_stdin) = io::pipe().map_err(pipe_error(StreamKind::Stdin))?;
    let (host_stdout, child_stdout) = io::pipe().map_err(pipe_error(StreamKind::Stdout))?;
    let (host_stderr, child_stderr) = io::pipe().map_err(pipe_error(StreamKind::Stderr))?;

    Ok((
        HostPipes {
            stdin: host_stdin,
            stdout: host_stdout,
            stderr: host_stderr,
        },
        ChildPipes {
            stdin: child_stdin,
            stdout: child_stdout,
            stderr: child_stderr,
        },
    ))
}

/// Host ends registered with the tokio reactor
#[derive(Debug)]
pub(crate) struct AsyncPipes {
    pub(crate) stdin: pipe::Sender,
    pub(crate) stdout: pipe::Receiver,
    pub(crate) stderr: pipe::Receiver,
}

impl HostPipes {
    /// Switch the host ends to non-blocking mode and register them.
    ///
    /// Must run inside a tokio runtime.
    pub(crate) fn register(self) -> io::Result<AsyncPipes> {
        let stdin = pipe::Sender::from_file(File::from(OwnedFd::from(self.stdin)))?;
        let stdout = pipe::Receiver::from_file(File::from(OwnedFd::from(self.stdout)))?;
        let stderr = pipe::Receiver::from_file(File::from(OwnedFd::from(self.stderr)))?;
        Ok(AsyncPipes {
            stdin,
            stdout,
            stderr,
        })
    }
}
