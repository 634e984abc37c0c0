//! Error types for the engine driver

use std::path::PathBuf;
use thiserror::Error;
use ucidriver_transport::ProcessError;

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while driving an engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Failure in the underlying process transport
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// `set_option` was called with a name the driver does not know
    #[error("invalid option '{name}'")]
    UnknownOption {
        /// Name as given by the caller
        name: String,
    },

    /// Option value outside its accepted range
    #[error("{name} value must be between {min} and {max} (got {value})")]
    OptionOutOfRange {
        /// Option name
        name: &'static str,
        /// Rejected value
        value: i64,
        /// Inclusive lower bound
        min: i64,
        /// Inclusive upper bound
        max: i64,
    },

    /// `run` was called on an engine that is already running
    #[error("engine '{}' is already running", .path.display())]
    AlreadyRunning {
        /// Engine path
        path: PathBuf,
    },

    /// The transport had no output stream to hand to the reader
    #[error("output of engine '{}' is not available", .path.display())]
    OutputUnavailable {
        /// Engine path
        path: PathBuf,
    },
}

impl EngineError {
    /// True for rejected `set_option` calls
    pub fn is_option_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownOption { .. } | Self::OptionOutOfRange { .. }
        )
    }

    /// True when the engine had to be killed after ignoring `quit`
    pub fn is_force_killed(&self) -> bool {
        matches!(self, Self::Process(e) if e.is_force_killed())
    }
}
