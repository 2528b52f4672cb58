//! TCP transport implementation

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crossway_core::{CrosswayError, CrosswayResult};
use crossway_wire::{decode_line, encode_line, Message};

/// Outbound connection attempts
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Fixed pause between failed attempts
    pub backoff: Duration,
    pub connect_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(2),
        }
    }
}

/// Connect to `addr`, retrying a bounded number of times
pub async fn connect_with_retry(addr: &str, retry: &RetryPolicy) -> CrosswayResult<TcpStream> {
    let attempts = retry.attempts.max(1);
    for attempt in 1..=attempts {
        match tokio::time::timeout(retry.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true)?;
                tracing::info!(%addr, attempt, "connected");
                return Ok(stream);
            }
            Ok(Err(e)) => tracing::warn!(%addr, attempt, "connect failed: {}", e),
            Err(_) => tracing::warn!(%addr, attempt, "connect timed out"),
        }
        if attempt < attempts {
            tokio::time::sleep(retry.backoff).await;
        }
    }
    Err(CrosswayError::ConnectionFailed {
        addr: addr.to_string(),
        attempts,
    })
}

/// Split a stream into line halves
pub fn split(stream: TcpStream) -> (LineReader, LineWriter) {
    let peer = stream.peer_addr().ok();
    let (read, write) = stream.into_split();
    (
        LineReader {
            lines: BufReader::new(read).lines(),
            peer,
        },
        LineWriter { write },
    )
}

/// Reading half: yields one line at a time
pub struct LineReader {
    lines: Lines<BufReader<OwnedReadHalf>>,
    peer: Option<SocketAddr>,
}

impl LineReader {
    /// Next non-empty line, or None at end of stream
    pub async fn next_line(&mut self) -> CrosswayResult<Option<String>> {
        loop {
            match self.lines.next_line().await? {
                Some(line) if line.trim().is_empty() => continue,
                other => return Ok(other),
            }
        }
    }

    /// Next decoded message; malformed lines surface as errors and the
    /// caller decides whether to skip them
    pub async fn next_message(&mut self) -> CrosswayResult<Option<CrosswayResult<Message>>> {
        Ok(self.next_line().await?.map(|line| decode_line(&line)))
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

/// Writing half
pub struct LineWriter {
    write: OwnedWriteHalf,
}

impl LineWriter {
    pub async fn write_line(&mut self, line: &str) -> CrosswayResult<()> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        self.write.write_all(&buf).await?;
        self.write.flush().await?;
        Ok(())
    }

    pub async fn send(&mut self, message: &Message) -> CrosswayResult<()> {
        self.write_line(&encode_line(message)?).await
    }

    pub async fn close(mut self) {
        let _ = self.write.shutdown().await;
    }
}

enum Outbound {
    Line(String),
    Close,
}

/// Cloneable handle onto a connection's writer task
#[derive(Clone, Debug)]
pub struct LinkSender {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl std::fmt::Debug for Outbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outbound::Line(line) => write!(f, "Line({line})"),
            Outbound::Close => f.write_str("Close"),
        }
    }
}

impl LinkSender {
    /// Queue a message; fails once the writer task has stopped
    pub fn send(&self, message: &Message) -> CrosswayResult<()> {
        self.send_line(encode_line(message)?)
    }

    pub fn send_line(&self, line: String) -> CrosswayResult<()> {
        self.tx
            .send(Outbound::Line(line))
            .map_err(|_| CrosswayError::LinkClosed)
    }

    /// Flush queued lines, then shut the write half down
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolve once the writer task has stopped
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    /// Two senders feeding the same writer task
    pub fn same_link(&self, other: &LinkSender) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

/// Start the background writer loop for a connection
pub fn start_writer(mut writer: LineWriter) -> (LinkSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Line(line) => {
                    if let Err(e) = writer.write_line(&line).await {
                        tracing::debug!("link write failed: {}", e);
                        break;
                    }
                }
                Outbound::Close => break,
            }
        }
        rx.close();
        writer.close().await;
    });

    (LinkSender { tx }, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossway_core::NodeId;
    use crossway_wire::{Ack, AckStatus, PhaseRequest};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_retry_gives_up() {
        // Bind then drop to obtain a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let retry = RetryPolicy {
            attempts: 2,
            backoff: Duration::from_millis(10),
            connect_timeout: Duration::from_millis(200),
        };
        let err = connect_with_retry(&addr, &retry).await.unwrap_err();
        assert!(matches!(err, CrosswayError::ConnectionFailed { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_writer_task_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let client = tokio::spawn(async move {
            let stream = connect_with_retry(&addr, &RetryPolicy::default()).await.unwrap();
            let (_reader, writer) = split(stream);
            let (sender, handle) = start_writer(writer);
            let request = PhaseRequest::new(NodeId::from("Cr1"), crossway_core::Direction::East);
            sender.send(&Message::PhaseRequest(request.clone())).unwrap();
            sender
                .send(&Message::Ok(Ack::phase(AckStatus::PhaseReleased, &request)))
                .unwrap();
            sender.close();
            handle.await.unwrap();
        });

        let (stream, _) = listener.accept().await.unwrap();
        let (mut reader, _writer) = split(stream);

        let first = reader.next_message().await.unwrap().unwrap().unwrap();
        assert_eq!(first.kind(), "PHASE_REQUEST");
        let second = reader.next_message().await.unwrap().unwrap().unwrap();
        assert_eq!(second.kind(), "OK");
        assert!(reader.next_line().await.unwrap().is_none());

        client.await.unwrap();
    }
}
