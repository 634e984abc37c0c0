//! Async driver for UCI chess engines
//!
//! Runs an engine binary as a child process and turns it into a session:
//! commands go in as lines, engine output comes back as a stream of lines,
//! and shutdown always leaves no process behind.
//!
//! # Architecture
//!
//! 1. **Transport Layer** (`ucidriver-transport`): the engine process, its pipes,
//!    and cooperative-then-forced shutdown
//! 2. **Driver Layer** (this crate): background output reader, command surface,
//!    validated options
//!
//! # Usage Example
//!
//! ```no_run
//! use ucidriver::Engine;
//!
//! #[tokio::main]
//! async fn main() -> ucidriver::Result<()> {
//!     let mut engine = Engine::new("/usr/local/bin/stockfish")?;
//!     engine.run().await?;
//!
//!     while let Some(line) = engine.recv_line().await {
//!         println!("{line}");
//!         if line == "uciok" {
//!             break;
//!         }
//!     }
//!
//!     engine.close().await
//! }
//! ```
//!
//! Parsing replies (`info`, `bestmove`, `option`) and handshake sequencing are
//! left to the caller.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![cfg(unix)]

pub mod config;
pub mod engine;
pub mod error;
mod reader;
pub mod testing;

// Re-export commonly used types
pub use config::{EngineOption, EngineOptions, OptionValue};
pub use engine::{
    DiagnosticsReceiver, Engine, EngineState, LINE_CHANNEL_CAPACITY, LineReceiver, MAX_LINE_LEN,
};
pub use error::{EngineError, Result};

pub use ucidriver_transport::{ProcessError, ProcessHandle, SHUTDOWN_GRACE, Transport};
