//! Engine session driver
//!
//! [`Engine`] sits on top of a [`Transport`] (a [`ProcessHandle`] in
//! production). It starts the engine, runs the background output reader,
//! sends commands and keeps the option record in sync with the engine.

use crate::config::{EngineOption, EngineOptions, OptionValue, check_multipv};
use crate::error::{EngineError, Result};
use crate::reader::OutputReader;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use ucidriver_transport::{ProcessError, ProcessHandle, Transport};

/// Capacity of the line channel. Kept at the minimum so a slow consumer
/// pushes back on the reader and, through the pipe buffer, on the engine.
pub const LINE_CHANNEL_CAPACITY: usize = 1;

/// Longest engine output line accepted, in bytes, excluding the terminator.
/// A longer line is reported on the diagnostics channel and ends delivery.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// How long `close` waits for the output reader to see end-of-stream
const READER_STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Receiving end of the engine output line channel
pub type LineReceiver = mpsc::Receiver<String>;

/// Receiving end of the reader's diagnostics channel
pub type DiagnosticsReceiver = mpsc::UnboundedReceiver<ProcessError>;

/// Lifecycle of an [`Engine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, not yet started
    Fresh,
    /// Engine started, reader running
    Running,
    /// Cancelled and closed (terminal)
    Stopped,
}

/// A UCI engine session
///
/// # Example
///
/// ```no_run
/// use ucidriver::Engine;
///
/// # async fn example() -> ucidriver::Result<()> {
/// let mut engine = Engine::new("/usr/local/bin/stockfish")?;
/// engine.run().await?;
///
/// while let Some(line) = engine.recv_line().await {
///     if line == "uciok" {
///         break;
///     }
/// }
///
/// engine.set_option("multipv", 3).await?;
/// engine.send_command(format!("go depth {}", engine.options().depth)).await;
/// engine.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Engine<T: Transport = ProcessHandle> {
    transport: T,
    cancel: CancellationToken,
    options: EngineOptions,
    state: EngineState,
    lines_tx: Option<mpsc::Sender<String>>,
    lines_rx: Option<LineReceiver>,
    diagnostics_tx: Option<mpsc::UnboundedSender<ProcessError>>,
    diagnostics_rx: Option<DiagnosticsReceiver>,
    reader: Option<JoinHandle<()>>,
}

impl Engine<ProcessHandle> {
    /// Create a driver for the engine binary at `path`.
    ///
    /// Fails with the path errors of [`ProcessHandle::new`].
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let handle = ProcessHandle::new(path)?;
        Ok(Self::with_transport(handle))
    }
}

impl<T: Transport> Engine<T> {
    /// Create a driver over an existing transport, with default options
    pub fn with_transport(transport: T) -> Self {
        let (lines_tx, lines_rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let (diagnostics_tx, diagnostics_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            cancel: CancellationToken::new(),
            options: EngineOptions::default(),
            state: EngineState::Fresh,
            lines_tx: Some(lines_tx),
            lines_rx: Some(lines_rx),
            diagnostics_tx: Some(diagnostics_tx),
            diagnostics_rx: Some(diagnostics_rx),
            reader: None,
        }
    }

    /// Path of the engine binary
    pub fn path(&self) -> &Path {
        self.transport.path()
    }

    /// Current option record
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Token that stops the output reader when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start the engine, send `uci` and spawn the output reader.
    pub async fn run(&mut self) -> Result<()> {
        match self.state {
            EngineState::Fresh => {}
            EngineState::Running => {
                return Err(EngineError::AlreadyRunning {
                    path: self.path().to_path_buf(),
                });
            }
            EngineState::Stopped => {
                return Err(ProcessError::Closed {
                    path: self.path().to_path_buf(),
                }
                .into());
            }
        }

        self.transport.start().await?;
        self.state = EngineState::Running;

        let (Some(output), Some(lines), Some(diagnostics)) = (
            self.transport.take_output(),
            self.lines_tx.take(),
            self.diagnostics_tx.take(),
        ) else {
            return Err(EngineError::OutputUnavailable {
                path: self.path().to_path_buf(),
            });
        };

        self.send_command("uci").await;

        let reader = OutputReader {
            path: self.path().to_path_buf(),
            output,
            lines,
            diagnostics,
            cancel: self.cancel.clone(),
        };
        self.reader = Some(tokio::spawn(reader.run()));

        debug!(path = %self.path().display(), "Engine running");
        Ok(())
    }

    /// Write one command line. Best effort: a failed write is logged, not returned.
    ///
    /// Anything `Display` is accepted, so templated commands can be passed as
    /// `format_args!("go depth {depth}")`.
    pub async fn send_command(&self, command: impl Display) {
        if let Err(e) = self.try_send_command(command).await {
            warn!(path = %self.path().display(), error = %e, "Dropped engine command");
        }
    }

    /// Write one command line, reporting write failures
    pub async fn try_send_command(&self, command: impl Display) -> Result<()> {
        let command = command.to_string();
        debug!(path = %self.path().display(), command = %command, "Sending engine command");
        self.transport.write_line(&command).await?;
        Ok(())
    }

    /// Set a recognized option.
    ///
    /// | name      | accepted         | wire effect                          |
    /// |-----------|------------------|--------------------------------------|
    /// | `depth`   | any integer      | none                                 |
    /// | `multipv` | `1..=256`        | `setoption name MultiPV value <n>`   |
    ///
    /// A rejected call leaves the option record untouched and writes nothing.
    /// The record is only updated once the wire line, if any, was written.
    pub async fn set_option(&mut self, name: &str, value: impl Into<OptionValue>) -> Result<()> {
        let option = EngineOption::from_name(name).ok_or_else(|| EngineError::UnknownOption {
            name: name.to_string(),
        })?;
        let OptionValue::Int(value) = value.into();

        let mut updated = self.options;
        match option {
            EngineOption::Depth => updated.depth = value,
            EngineOption::MultiPv => updated.multipv = check_multipv(value)?,
        }

        if let Some(uci_name) = option.uci_name() {
            self.try_send_command(format!("setoption name {uci_name} value {value}"))
                .await?;
        }

        self.options = updated;
        Ok(())
    }

    /// Receive the next engine output line.
    ///
    /// Returns `None` once the reader has stopped and the channel is drained,
    /// or if the receiver was taken with [`take_output`](Self::take_output).
    pub async fn recv_line(&mut self) -> Option<String> {
        self.lines_rx.as_mut()?.recv().await
    }

    /// Take the line receiver, e.g. to consume output on another task
    pub fn take_output(&mut self) -> Option<LineReceiver> {
        self.lines_rx.take()
    }

    /// Take the receiver of unexpected reader errors
    pub fn take_diagnostics(&mut self) -> Option<DiagnosticsReceiver> {
        self.diagnostics_rx.take()
    }

    /// Stop delivering engine output. Lines not yet received are dropped.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel the reader and close the transport, returning the transport's
    /// shutdown result. Idempotent.
    ///
    /// The cancelled reader stops delivering lines but keeps draining the
    /// engine's output until the transport closes it.
    pub async fn close(&mut self) -> Result<()> {
        self.cancel.cancel();
        let result = self.transport.close().await;
        self.state = EngineState::Stopped;

        if let Some(mut reader) = self.reader.take() {
            match tokio::time::timeout(READER_STOP_TIMEOUT, &mut reader).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(path = %self.path().display(), error = %e, "Output reader task failed");
                }
                Err(_) => {
                    warn!(path = %self.path().display(), "Engine output still open after close, aborting reader");
                    reader.abort();
                }
            }
        }

        result.map_err(EngineError::from)
    }
}

impl<T: Transport> Drop for Engine<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
