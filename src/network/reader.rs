use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::network::Frame;
use crate::Shutdown;

/// Spawns the reader loop for one open connection.
///
/// The loop owns the read half and a cursor buffer. Reads may deliver any
/// number of complete frames at once, or none; every complete frame is
/// drained from the buffer and pushed onto `frame_tx`, where the session
/// correlates it with whatever response it is currently waiting for. A
/// corrupt frame is logged and skipped, the loop keeps going.
///
/// The loop exits on the shutdown broadcast, on EOF, or when the session
/// drops its receiver; `_shutdown_complete` is released on exit so the
/// poller's stop can wait for it.
pub(crate) fn spawn_reader(
    mut read_half: OwnedReadHalf,
    frame_tx: mpsc::Sender<Frame>,
    mut shutdown: Shutdown,
    _shutdown_complete: mpsc::Sender<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buffer = BytesMut::with_capacity(4 * 1024);
        loop {
            // drain every complete frame before blocking on the socket again
            loop {
                match Frame::parse(&mut buffer) {
                    Ok(Some(frame)) => {
                        trace!("received {:?} frame", frame.frame_type);
                        if frame_tx.send(frame).await.is_err() {
                            debug!("frame receiver dropped, reader exiting");
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => warn!("dropping corrupt frame: {}", e),
                }
            }

            let n = tokio::select! {
                _ = shutdown.recv() => {
                    debug!("reader received shutdown");
                    return;
                }
                res = read_half.read_buf(&mut buffer) => match res {
                    Ok(n) => n,
                    Err(e) => {
                        debug!("read failed: {}", e);
                        return;
                    }
                },
            };
            if n == 0 {
                if buffer.is_empty() {
                    debug!("server closed the connection");
                } else {
                    warn!(
                        "connection reset with {} bytes of a partial frame buffered",
                        buffer.len()
                    );
                }
                return;
            }
        }
    })
}
