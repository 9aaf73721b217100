//! Dedicated writer task owning the connection's write path.
//!
//! All outgoing frames funnel through one mpsc channel into a single
//! task that owns the socket's write half. Concurrent `invoke` calls can
//! therefore never interleave partial frames: a frame enters the channel
//! whole and is written whole. Frames that are ready together are
//! coalesced into one buffer per wakeup to keep syscall count down.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{BotwireError, Result};
use crate::protocol::{Header, HEADER_SIZE};

/// Default writer channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Maximum frames coalesced into a single write.
const MAX_BATCH_SIZE: usize = 32;

/// A frame ready to be written to the socket.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Pre-encoded header.
    header: [u8; HEADER_SIZE],
    /// Payload bytes (may be empty).
    payload: Bytes,
}

impl OutboundFrame {
    /// Create a new outbound frame.
    pub fn new(header: &Header, payload: Bytes) -> Self {
        Self {
            header: header.encode(),
            payload,
        }
    }

    /// Total size of this frame (header + payload).
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Handle for submitting frames to the writer task. Cheaply cloneable.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue a frame for writing.
    ///
    /// Waits when the channel is full; fails with `Disconnected` once
    /// the writer task has shut down.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| BotwireError::Disconnected)
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The task exits cleanly when every handle is dropped, or with the I/O
/// error that broke the socket.
pub fn spawn_writer_task<W>(writer: W, capacity: usize) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity);
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

/// Writer loop: receive frames, coalesce, write.
async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::new();

    while let Some(first) = rx.recv().await {
        buf.clear();
        buf.extend_from_slice(&first.header);
        buf.extend_from_slice(&first.payload);

        // coalesce whatever else is already queued
        let mut batched = 1;
        while batched < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => {
                    buf.extend_from_slice(&frame.header);
                    buf.extend_from_slice(&frame.payload);
                    batched += 1;
                }
                Err(_) => break,
            }
        }

        writer.write_all(&buf).await?;
        writer.flush().await?;
    }

    // channel closed: connection is shutting down
    writer.shutdown().await.ok();
    Ok(())
}
