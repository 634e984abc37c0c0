//! Testing utilities
//!
//! Provides an in-memory transport so the driver can be exercised without
//! spawning an engine process.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::DuplexStream;
use ucidriver_transport::{OutputStream, ProcessError, Transport};

/// Size of the in-memory pipe between the fake engine and the driver
const MOCK_PIPE_CAPACITY: usize = 64 * 1024;

/// Mock transport that records written lines
///
/// Clones share state, so a test can keep one clone for assertions while the
/// engine owns another.
///
/// - Lines written by the driver are captured in order
/// - Engine output is produced by writing to [`take_engine_side`](Self::take_engine_side)
/// - Writes fail before `start` and after `close`, like a real process
#[derive(Clone)]
pub struct MockTransport {
    path: PathBuf,
    written: Arc<Mutex<Vec<String>>>,
    output: Arc<Mutex<Option<DuplexStream>>>,
    engine_side: Arc<Mutex<Option<DuplexStream>>>,
    started: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    close_calls: Arc<AtomicUsize>,
    quits: Arc<AtomicUsize>,
}

impl MockTransport {
    /// Create a new mock reporting `path` as its engine location
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (engine_side, output) = tokio::io::duplex(MOCK_PIPE_CAPACITY);
        Self {
            path: path.into(),
            written: Arc::new(Mutex::new(Vec::new())),
            output: Arc::new(Mutex::new(Some(output))),
            engine_side: Arc::new(Mutex::new(Some(engine_side))),
            started: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
            close_calls: Arc::new(AtomicUsize::new(0)),
            quits: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Take the fake engine's stdout; bytes written here reach the driver
    pub fn take_engine_side(&self) -> Option<DuplexStream> {
        self.engine_side
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Lines written through the transport so far
    pub fn written_lines(&self) -> Vec<String> {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `close` calls
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Number of `quit` lines the mock would have sent
    pub fn quit_count(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }

    fn refuse_write(&self, reason: &str) -> ProcessError {
        ProcessError::Write {
            path: self.path.clone(),
            source: io::Error::new(io::ErrorKind::BrokenPipe, reason.to_string()),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn start(&self) -> ucidriver_transport::Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ProcessError::Closed {
                path: self.path.clone(),
            });
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ProcessError::AlreadyStarted {
                path: self.path.clone(),
            });
        }
        Ok(())
    }

    async fn write_line(&self, line: &str) -> ucidriver_transport::Result<()> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(self.refuse_write("engine has not been started"));
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(self.refuse_write("either stdin pipe or process is closed"));
        }
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }

    fn take_output(&self) -> Option<OutputStream> {
        if !self.started.load(Ordering::SeqCst) {
            return None;
        }
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(|stream| Box::new(stream) as OutputStream)
    }

    async fn close(&self) -> ucidriver_transport::Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if !self.closed.swap(true, Ordering::SeqCst) && self.started.load(Ordering::SeqCst) {
            self.quits.fetch_add(1, Ordering::SeqCst);
            // the fake engine exits: its stdout reaches EOF
            self.engine_side
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
        }
        Ok(())
    }
}
