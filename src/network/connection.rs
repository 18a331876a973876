use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, trace};

use crate::network::Frame;
use crate::{AppError, AppResult};

/// The write side of one TCP connection to the notification server.
///
/// `connect` splits the stream: the read half goes to exactly one reader
/// loop, the write half stays here behind a `BufWriter`. The session
/// drives all sends from a single task, so at most one frame is ever in
/// flight on the write side.
#[derive(Debug)]
pub struct Connection {
    writer: BufWriter<OwnedWriteHalf>,
    peer: String,
    closed: bool,
}

impl Connection {
    /// Opens a connection to `addr` with a bounded connect timeout.
    ///
    /// Refused, unreachable and timed-out connects are all reported as
    /// `ConnectError`; the caller abandons the cycle and retries on the
    /// next poller tick.
    pub async fn connect(
        addr: &str,
        connect_timeout: Duration,
    ) -> AppResult<(Connection, OwnedReadHalf)> {
        let stream = match time::timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(AppError::ConnectError {
                    addr: addr.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(AppError::ConnectError {
                    addr: addr.to_string(),
                    reason: format!("timed out after {:?}", connect_timeout),
                })
            }
        };
        debug!("connected to {}", addr);

        let (read_half, write_half) = stream.into_split();
        let connection = Connection {
            writer: BufWriter::new(write_half),
            peer: addr.to_string(),
            closed: false,
        };
        Ok((connection, read_half))
    }

    pub async fn send(&mut self, frame: &Frame) -> AppResult<()> {
        if self.closed {
            return Err(AppError::IllegalStateError(format!(
                "send on closed connection to {}",
                self.peer
            )));
        }
        let bytes = frame.encode()?;
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        trace!("sent {:?} frame ({} bytes)", frame.frame_type, bytes.len());
        Ok(())
    }

    /// Shuts the write half down. Idempotent; a second close is a no-op.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.writer.shutdown().await {
            debug!("shutdown of connection to {}: {}", self.peer, e);
        }
        debug!("connection to {} closed", self.peer);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
