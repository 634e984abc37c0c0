//! Child-process transport for UCI chess engines
//!
//! Launches an engine binary, owns its three standard streams and shuts it
//! down cooperatively (`quit`) with a forced kill as the fallback.
//!
//! # Architecture
//!
//! - **Transport trait**: the line-oriented interface the engine driver uses
//! - **Subprocess transport**: [`ProcessHandle`], one engine process and its pipes
//! - **Error handling**: [`ProcessError`], one variant per failure the caller can tell apart
//!
//! # Usage
//!
//! ```no_run
//! use ucidriver_transport::ProcessHandle;
//!
//! # async fn example() -> ucidriver_transport::Result<()> {
//! let engine = ProcessHandle::new("/usr/local/bin/stockfish")?;
//! engine.start().await?;
//! engine.write_line("uci").await?;
//! engine.close().await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![cfg(unix)]

pub mod error;
pub mod subprocess;
pub mod traits;

// Re-export commonly used types
pub use error::{ProcessError, Result, StreamKind};
pub use subprocess::{KILL_REAP_TIMEOUT, ProcessHandle, ProcessState, SHUTDOWN_GRACE};
pub use traits::{OutputStream, Transport};
