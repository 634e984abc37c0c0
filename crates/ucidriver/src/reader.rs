//! Background reader copying engine output lines onto the line channel

use crate::engine::MAX_LINE_LEN;
use std::io;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use ucidriver_transport::{OutputStream, ProcessError};

/// One reader per engine. Lines keep the order the engine wrote them in.
pub(crate) struct OutputReader {
    pub(crate) path: PathBuf,
    pub(crate) output: OutputStream,
    pub(crate) lines: mpsc::Sender<String>,
    pub(crate) diagnostics: mpsc::UnboundedSender<ProcessError>,
    pub(crate) cancel: CancellationToken,
}

impl OutputReader {
    /// Deliver lines until end-of-stream, cancellation, a dropped receiver,
    /// an oversized line, or a read error.
    ///
    /// Except after a read error, the output stays open and is drained until
    /// the engine closes it, so an engine still writing is never hit by SIGPIPE.
    pub(crate) async fn run(self) {
        let Self {
            path,
            output,
            lines,
            diagnostics,
            cancel,
        } = self;

        let mut reader = BufReader::new(output);
        let mut buf = Vec::new();

        loop {
            let read = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(path = %path.display(), "Output reader cancelled");
                    break;
                }
                read = read_bounded_line(&mut reader, &mut buf) => read,
            };

            match read {
                Ok(_) if buf.is_empty() => {
                    debug!(path = %path.display(), "Engine output closed");
                    return;
                }
                Ok(_) if strip_terminator(&buf).len() > MAX_LINE_LEN => {
                    let source = io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("engine output line exceeds {MAX_LINE_LEN} bytes"),
                    );
                    warn!(path = %path.display(), error = %source, "UCI engine communication failure");
                    let _ = diagnostics.send(ProcessError::Read {
                        path: path.clone(),
                        source,
                    });
                    break;
                }
                Ok(_) => {
                    let line = decode_line(&buf);
                    buf.clear();
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            debug!(path = %path.display(), "Output reader cancelled");
                            break;
                        }
                        sent = lines.send(line) => {
                            if sent.is_err() {
                                debug!(path = %path.display(), "Output receiver dropped");
                                break;
                            }
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_end_of_stream(&e) => {
                    debug!(path = %path.display(), error = %e, "Engine output closed");
                    return;
                }
                Err(source) => {
                    warn!(path = %path.display(), error = %source, "UCI engine communication failure");
                    let _ = diagnostics.send(ProcessError::Read { path, source });
                    return;
                }
            }
        }

        // receivers see the end of the stream now; the pipe stays open until EOF
        drop(lines);
        drop(diagnostics);
        match tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
            Ok(discarded) => {
                debug!(path = %path.display(), discarded, "Engine output drained");
            }
            Err(e) => debug!(path = %path.display(), error = %e, "Engine output drain ended"),
        }
    }
}

/// Read one line, giving up once it cannot fit in [`MAX_LINE_LEN`] bytes
/// plus a `\r\n` terminator
async fn read_bounded_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let limit = (MAX_LINE_LEN + 2).saturating_sub(buf.len()) as u64;
    (&mut *reader).take(limit).read_until(b'\n', buf).await
}

fn is_end_of_stream(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe
    )
}

fn strip_terminator(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}

/// Strip the `\n` or `\r\n` terminator and decode lossily
fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(strip_terminator(raw)).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, ReadBuf};

    struct FailingOutput(io::ErrorKind);

    impl AsyncRead for FailingOutput {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(self.0, "read failed")))
        }
    }

    fn reader(
        output: OutputStream,
        capacity: usize,
    ) -> (
        OutputReader,
        mpsc::Receiver<String>,
        mpsc::UnboundedReceiver<ProcessError>,
        CancellationToken,
    ) {
        let (lines_tx, lines_rx) = mpsc::channel(capacity);
        let (diag_tx, diag_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let reader = OutputReader {
            path: PathBuf::from("stub-engine"),
            output,
            lines: lines_tx,
            diagnostics: diag_tx,
            cancel: cancel.clone(),
        };
        (reader, lines_rx, diag_rx, cancel)
    }

    #[test]
    fn test_decode_line_strips_terminators() {
        assert_eq!(decode_line(b"uciok\n"), "uciok");
        assert_eq!(decode_line(b"readyok\r\n"), "readyok");
        assert_eq!(decode_line(b"bestmove e2e4"), "bestmove e2e4");
        assert_eq!(decode_line(b"id name \xff\n"), "id name \u{fffd}");
    }

    #[tokio::test]
    async fn test_lines_arrive_in_order_then_channel_closes() {
        let output = Box::new(Cursor::new(b"id name Stub\r\nuciok\nreadyok".to_vec()));
        let (reader, mut lines, mut diagnostics, _cancel) = reader(output, 1);
        let task = tokio::spawn(reader.run());

        assert_eq!(lines.recv().await.as_deref(), Some("id name Stub"));
        assert_eq!(lines.recv().await.as_deref(), Some("uciok"));
        assert_eq!(lines.recv().await.as_deref(), Some("readyok"));
        assert_eq!(lines.recv().await, None);

        task.await.unwrap();
        assert!(diagnostics.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cancelled_reader_sends_nothing() {
        let output = Box::new(Cursor::new(b"info depth 1\ninfo depth 2\n".to_vec()));
        let (reader, mut lines, _diagnostics, cancel) = reader(output, 1);
        cancel.cancel();

        reader.run().await;
        assert_eq!(lines.recv().await, None);
    }

    #[tokio::test]
    async fn test_cancel_while_blocked_on_send() {
        let output = Box::new(Cursor::new(b"a\nb\nc\n".to_vec()));
        let (reader, mut lines, _diagnostics, cancel) = reader(output, 1);
        let task = tokio::spawn(reader.run());

        assert_eq!(lines.recv().await.as_deref(), Some("a"));
        cancel.cancel();
        task.await.unwrap();

        let mut remaining = 0;
        while lines.recv().await.is_some() {
            remaining += 1;
        }
        assert!(remaining <= 1);
    }

    #[tokio::test]
    async fn test_broken_pipe_is_normal_termination() {
        let (reader, mut lines, mut diagnostics, _cancel) =
            reader(Box::new(FailingOutput(io::ErrorKind::BrokenPipe)), 1);

        reader.run().await;
        assert_eq!(lines.recv().await, None);
        assert!(diagnostics.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unexpected_error_goes_to_diagnostics() {
        let (reader, mut lines, mut diagnostics, _cancel) =
            reader(Box::new(FailingOutput(io::ErrorKind::InvalidData)), 1);

        reader.run().await;
        assert_eq!(lines.recv().await, None);

        let err = diagnostics.try_recv().unwrap();
        assert!(matches!(err, ProcessError::Read { .. }));
        assert!(err.to_string().contains("stub-engine"));
    }

    #[tokio::test]
    async fn test_line_at_length_limit_is_delivered() {
        let mut raw = vec![b'a'; MAX_LINE_LEN];
        raw.extend_from_slice(b"\r\nuciok\n");
        let (reader, mut lines, mut diagnostics, _cancel) = reader(Box::new(Cursor::new(raw)), 1);
        let task = tokio::spawn(reader.run());

        assert_eq!(lines.recv().await.map(|l| l.len()), Some(MAX_LINE_LEN));
        assert_eq!(lines.recv().await.as_deref(), Some("uciok"));
        assert_eq!(lines.recv().await, None);

        task.await.unwrap();
        assert!(diagnostics.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_oversized_line_goes_to_diagnostics() {
        let mut raw = vec![b'a'; 4 * MAX_LINE_LEN];
        raw.extend_from_slice(b"\nuciok\n");
        let (reader, mut lines, mut diagnostics, _cancel) = reader(Box::new(Cursor::new(raw)), 1);

        reader.run().await;
        assert_eq!(lines.recv().await, None);

        match diagnostics.try_recv().unwrap() {
            ProcessError::Read { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::InvalidData);
                assert!(source.to_string().contains(&MAX_LINE_LEN.to_string()));
            }
            other => panic!("expected a read error, got {other:?}"),
        }
    }
}
