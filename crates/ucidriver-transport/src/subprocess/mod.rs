//! Subprocess transport for UCI engines
//!
//! Owns the engine child process and its stdin/stdout/stderr pipes.

mod pipes;
pub mod process;

pub use process::{KILL_REAP_TIMEOUT, ProcessHandle, ProcessState, SHUTDOWN_GRACE};
