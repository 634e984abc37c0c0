//! Transport error types

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, ProcessError>;

/// Which of the child's standard streams a pipe belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Child standard input (host writes)
    Stdin,
    /// Child standard output (host reads)
    Stdout,
    /// Child standard error (host reads)
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdin => write!(f, "stdin"),
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// Errors that can occur while managing an engine process
#[derive(Debug, Error)]
pub enum ProcessError {
    // Construction errors
    /// Engine path is empty or otherwise unusable
    #[error("invalid engine path: {0}")]
    Config(String),

    /// Nothing exists at the engine path
    #[error("engine binary '{}' not found", .path.display())]
    NotFound {
        /// Offending path
        path: PathBuf,
    },

    /// The engine path names a directory
    #[error("engine path '{}' is a directory, not a file", .path.display())]
    NotAFile {
        /// Offending path
        path: PathBuf,
    },

    /// The engine path exists but cannot be inspected
    #[error("engine path '{}' is not accessible: {source}", .path.display())]
    AccessDenied {
        /// Offending path
        path: PathBuf,
        /// Underlying stat failure
        #[source]
        source: io::Error,
    },

    /// One of the three standard-stream pipes could not be created
    #[error("failed to create {stream} pipe for engine '{}': {source}", .path.display())]
    PipeCreate {
        /// Stream whose pipe failed
        stream: StreamKind,
        /// Engine path
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    // Lifecycle errors
    /// The child process could not be launched
    #[error("failed to start the engine '{}': {source}", .path.display())]
    Spawn {
        /// Engine path
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// `start` was called on a handle that already launched its child
    #[error("engine '{}' has already been started", .path.display())]
    AlreadyStarted {
        /// Engine path
        path: PathBuf,
    },

    /// The handle has been shut down
    #[error("engine '{}' has been closed", .path.display())]
    Closed {
        /// Engine path
        path: PathBuf,
    },

    // I/O errors
    /// Writing to the engine's standard input failed
    #[error("failed to write to engine '{}': {source}", .path.display())]
    Write {
        /// Engine path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Reading the engine's standard output failed for a reason other than end-of-stream
    #[error("failed to read output of engine '{}': {source}", .path.display())]
    Read {
        /// Engine path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    // Shutdown errors
    /// The engine exited unsuccessfully after `quit`
    #[error("engine '{}' exited with an error during shutdown: {status}", .path.display())]
    Shutdown {
        /// Engine path
        path: PathBuf,
        /// Exit status reported by the OS
        status: ExitStatus,
    },

    /// Waiting for the engine to exit failed
    #[error("failed to wait for engine '{}' to exit: {reason}", .path.display())]
    Wait {
        /// Engine path
        path: PathBuf,
        /// Description of the wait failure
        reason: String,
    },

    /// The engine ignored `quit` and was killed
    #[error("engine '{}' did not respond to quit within {grace:?}, force killed", .path.display())]
    ForceKilled {
        /// Engine path
        path: PathBuf,
        /// Grace period that elapsed before the kill
        grace: Duration,
    },
}

impl ProcessError {
    /// Create a new `Config` error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a `Write` error for a handle whose input is not available
    pub(crate) fn input_unavailable(path: impl Into<PathBuf>, reason: &str) -> Self {
        Self::Write {
            path: path.into(),
            source: io::Error::new(io::ErrorKind::BrokenPipe, reason.to_string()),
        }
    }

    /// True when the engine had to be killed after ignoring `quit`
    pub fn is_force_killed(&self) -> bool {
        matches!(self, Self::ForceKilled { .. })
    }

    /// True for errors raised while validating the engine path
    pub fn is_path_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::NotFound { .. } | Self::NotAFile { .. } | Self::AccessDenied { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_path_and_cause() {
        let err = ProcessError::NotFound {
            path: PathBuf::from("/does/not/exist"),
        };
        assert_eq!(err.to_string(), "engine binary '/does/not/exist' not found");

        let err = ProcessError::PipeCreate {
            stream: StreamKind::Stderr,
            path: PathBuf::from("/usr/bin/stockfish"),
            source: io::Error::other("too many open files"),
        };
        let msg = err.to_string();
        assert!(msg.contains("stderr"));
        assert!(msg.contains("/usr/bin/stockfish"));
        assert!(msg.contains("too many open files"));
    }

    #[test]
    fn test_force_killed_message_includes_grace() {
        let err = ProcessError::ForceKilled {
            path: PathBuf::from("engine"),
            grace: Duration::from_secs(3),
        };
        assert!(err.is_force_killed());
        assert!(err.to_string().contains("3s"));
        assert!(err.to_string().contains("force killed"));
    }

    #[test]
    fn test_path_error_classification() {
        assert!(ProcessError::config("engine path cannot be empty").is_path_error());
        assert!(
            ProcessError::NotAFile {
                path: PathBuf::from("/tmp")
            }
            .is_path_error()
        );
        assert!(!ProcessError::input_unavailable("engine", "closed").is_path_error());
    }
}
