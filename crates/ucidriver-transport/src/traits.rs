//! Transport trait
//!
//! Defines the interface the engine driver needs from whatever carries its
//! lines to and from the engine. [`crate::ProcessHandle`] is the production
//! implementation; tests substitute an in-memory transport.

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio::io::AsyncRead;

/// Byte source carrying the engine's standard output
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Line-oriented, single-shutdown transport to a UCI engine
#[async_trait]
pub trait Transport: Send + Sync {
    /// Location of the engine this transport talks to
    fn path(&self) -> &Path;

    /// Launch the engine
    async fn start(&self) -> Result<()>;

    /// Write one line, appending the newline terminator
    async fn write_line(&self, line: &str) -> Result<()>;

    /// Take the engine's output stream. Returns `None` once taken, before
    /// start, or after close.
    fn take_output(&self) -> Option<OutputStream>;

    /// Shut the engine down. Idempotent: every call returns the first
    /// call's outcome.
    async fn close(&self) -> Result<()>;
}
