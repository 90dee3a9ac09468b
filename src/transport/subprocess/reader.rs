//! Reader loops for the subprocess output channels
//!
//! One task per channel. Both frame newline-delimited lines under the
//! configured length limit and hand everything they learn to the
//! [`DispatchQueue`]; neither ever returns an error to its caller.
//!
//! Lines are decoded lossily: a stray invalid UTF-8 byte costs one line at
//! most, never the channel.

use std::time::Instant;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, FramedRead};

use crate::dispatch::{Channel, DispatchAction, DispatchQueue};
use crate::message::{ParseError, parse_line};
use crate::types::events::LogKind;

/// Newline framing that never fails on encoding
///
/// Invalid UTF-8 is replaced with U+FFFD and a trailing `\r` is dropped.
struct LossyLines {
    inner: AnyDelimiterCodec,
}

impl LossyLines {
    fn new(max_line_bytes: usize) -> Self {
        Self {
            inner: AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), Vec::new(), max_line_bytes),
        }
    }
}

fn lossy(chunk: &[u8]) -> String {
    let chunk = chunk.strip_suffix(b"\r").unwrap_or(chunk);
    String::from_utf8_lossy(chunk).into_owned()
}

impl Decoder for LossyLines {
    type Item = String;
    type Error = AnyDelimiterCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        Ok(self.inner.decode(buf)?.map(|chunk| lossy(&chunk)))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        Ok(self.inner.decode_eof(buf)?.map(|chunk| lossy(&chunk)))
    }
}

/// Primary channel loop: parse each line into events
///
/// Unparseable lines become `ParseFailed` actions and reading continues.
/// A read error becomes one `ReadFailed` action and stops the loop. End of
/// stream, or a read error, is followed by `StreamClosed`.
pub async fn run_primary_reader<R>(stdout: R, queue: DispatchQueue, turn: u64, max_line_bytes: usize)
where
    R: AsyncRead + Unpin,
{
    let mut framed = FramedRead::new(stdout, LossyLines::new(max_line_bytes));
    let mut skipping = false;

    loop {
        let Some(item) = framed.next().await else {
            // A framing error pauses the stream for exactly one `None`.
            if std::mem::take(&mut skipping) {
                continue;
            }
            break;
        };
        match item {
            Ok(line) => {
                queue.touch(Channel::Primary, Instant::now());
                log::debug!("[turn {turn}] stdout: {line}");
                match parse_line(&line) {
                    Ok(events) => {
                        for event in events {
                            queue.push(turn, DispatchAction::Event(event));
                        }
                    }
                    Err(err) => queue.push(turn, DispatchAction::ParseFailed(err)),
                }
            }
            Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => {
                skipping = true;
                queue.touch(Channel::Primary, Instant::now());
                queue.push(
                    turn,
                    DispatchAction::ParseFailed(ParseError::LineTooLong(max_line_bytes)),
                );
            }
            Err(AnyDelimiterCodecError::Io(err)) => {
                queue.push(
                    turn,
                    DispatchAction::ReadFailed {
                        channel: Channel::Primary,
                        message: err.to_string(),
                    },
                );
                break;
            }
        }
    }

    log::debug!("[turn {turn}] stdout closed");
    queue.push(turn, DispatchAction::StreamClosed);
}

/// Diagnostic channel loop: surface every line verbatim as an error entry
///
/// The diagnostic channel is best-effort; read errors end the loop quietly.
pub async fn run_diagnostic_reader<R>(
    stderr: R,
    queue: DispatchQueue,
    turn: u64,
    max_line_bytes: usize,
) where
    R: AsyncRead + Unpin,
{
    let mut framed = FramedRead::new(stderr, LossyLines::new(max_line_bytes));
    let mut skipping = false;

    loop {
        let Some(item) = framed.next().await else {
            if std::mem::take(&mut skipping) {
                continue;
            }
            break;
        };
        match item {
            Ok(line) => {
                queue.touch(Channel::Diagnostic, Instant::now());
                if line.trim().is_empty() {
                    continue;
                }
                queue.push(
                    turn,
                    DispatchAction::Log {
                        kind: LogKind::Error,
                        text: line,
                    },
                );
            }
            Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => {
                skipping = true;
                queue.touch(Channel::Diagnostic, Instant::now());
            }
            Err(AnyDelimiterCodecError::Io(err)) => {
                log::debug!("[turn {turn}] stderr read failed: {err}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::ReadBuf;

    use super::*;
    use crate::types::events::StreamEvent;

    /// Yields `data` once, then fails every read
    struct BrokenPipe {
        data: Option<Vec<u8>>,
    }

    impl AsyncRead for BrokenPipe {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match self.data.take() {
                Some(data) => {
                    buf.put_slice(&data);
                    Poll::Ready(Ok(()))
                }
                None => Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe gone"))),
            }
        }
    }

    fn actions(queue: &DispatchQueue) -> Vec<DispatchAction> {
        queue.drain().into_iter().map(|p| p.action).collect()
    }

    #[tokio::test]
    async fn test_invalid_utf8_on_stdout_costs_one_line() {
        let input: &[u8] = b"\xff\n{\"type\":\"thinking\"}\n";
        let queue = DispatchQueue::new(Instant::now());
        run_primary_reader(input, queue.clone(), 1, 1024).await;

        let actions = actions(&queue);
        assert_eq!(actions.len(), 3, "{actions:?}");
        assert!(matches!(actions[0], DispatchAction::ParseFailed(ParseError::NotAnObject(_))));
        assert_eq!(actions[1], DispatchAction::Event(StreamEvent::Thinking));
        assert_eq!(actions[2], DispatchAction::StreamClosed);
    }

    #[tokio::test]
    async fn test_invalid_utf8_on_stderr_keeps_draining() {
        let input: &[u8] = b"\xffbad\npermission denied\r\n";
        let queue = DispatchQueue::new(Instant::now());
        run_diagnostic_reader(input, queue.clone(), 1, 1024).await;

        let texts: Vec<_> = actions(&queue)
            .into_iter()
            .map(|action| match action {
                DispatchAction::Log { text, .. } => text,
                other => panic!("unexpected action {other:?}"),
            })
            .collect();
        assert_eq!(texts, ["\u{FFFD}bad", "permission denied"]);
    }

    #[tokio::test]
    async fn test_stdout_read_error_reports_once_then_closes() {
        let pipe = BrokenPipe {
            data: Some(b"{\"type\":\"thinking\"}\n".to_vec()),
        };
        let queue = DispatchQueue::new(Instant::now());
        run_primary_reader(pipe, queue.clone(), 2, 1024).await;

        let actions = actions(&queue);
        assert_eq!(actions.len(), 3, "{actions:?}");
        assert_eq!(actions[0], DispatchAction::Event(StreamEvent::Thinking));
        assert!(matches!(
            &actions[1],
            DispatchAction::ReadFailed { channel: Channel::Primary, message } if message.contains("pipe gone")
        ));
        assert_eq!(actions[2], DispatchAction::StreamClosed);
    }

    #[tokio::test]
    async fn test_primary_reader_orders_actions_and_closes() {
        let input: &[u8] = b"{\"type\":\"thinking\"}\nnot json\n{\"type\":\"error\",\"error\":\"boom\"}\n";
        let queue = DispatchQueue::new(Instant::now());
        run_primary_reader(input, queue.clone(), 3, 1024).await;

        let actions: Vec<_> = queue.drain().into_iter().map(|p| p.action).collect();
        assert_eq!(actions.len(), 4);
        assert_eq!(actions[0], DispatchAction::Event(StreamEvent::Thinking));
        assert!(matches!(actions[1], DispatchAction::ParseFailed(ParseError::NotAnObject(_))));
        assert_eq!(
            actions[2],
            DispatchAction::Event(StreamEvent::Error {
                message: "boom".to_string()
            })
        );
        assert_eq!(actions[3], DispatchAction::StreamClosed);
        assert_eq!(queue.liveness().lines_primary, 3);
    }

    #[tokio::test]
    async fn test_overlong_line_is_reported_and_skipped() {
        let long = format!("{{\"type\":\"assistant\",\"x\":\"{}\"}}\n", "a".repeat(64));
        let input = format!("{long}{{\"type\":\"thinking\"}}\n");
        let queue = DispatchQueue::new(Instant::now());
        run_primary_reader(input.as_bytes(), queue.clone(), 1, 32).await;

        let actions: Vec<_> = queue.drain().into_iter().map(|p| p.action).collect();
        assert_eq!(actions[0], DispatchAction::ParseFailed(ParseError::LineTooLong(32)));
        assert_eq!(actions[1], DispatchAction::Event(StreamEvent::Thinking));
    }

    #[tokio::test]
    async fn test_diagnostic_lines_become_error_logs() {
        let input: &[u8] = b"permission denied\n\nretrying\n";
        let queue = DispatchQueue::new(Instant::now());
        run_diagnostic_reader(input, queue.clone(), 1, 1024).await;

        let texts: Vec<_> = queue
            .drain()
            .into_iter()
            .map(|p| match p.action {
                DispatchAction::Log { kind, text } => {
                    assert_eq!(kind, LogKind::Error);
                    text
                }
                other => panic!("unexpected action {other:?}"),
            })
            .collect();
        assert_eq!(texts, ["permission denied", "retrying"]);
        assert_eq!(queue.liveness().lines_primary, 0);
    }
}
