//! [`Recipient`] backed by the write half of a framed stream.
//!
//! # Outbound queue (for beginners)
//!
//! ```text
//! relay ──deliver()──► bounded mpsc queue ──writer task──► FrameWriter ──► socket
//!          (try_send,                         (one per
//!           never waits)                       connection)
//! ```
//!
//! `deliver` only enqueues, so a peer that stops reading can never hold up the
//! relay or the other participants.  When a peer's queue fills up, or one of
//! its writes fails or times out, the recipient is flagged as cut off and its
//! connection handler closes the session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use lanchat_core::FrameWriter;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::debug;

use crate::application::recipient::{DeliveryError, Recipient};

/// Frames a peer may fall behind before it is cut off.
pub const DEFAULT_OUTBOUND_QUEUE: usize = 256;

/// Longest [`StreamRecipient::close`] waits for queued frames to drain.  A
/// shorter write timeout shortens it further.
pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Queues relayed payloads for one peer and writes them from a dedicated task.
///
/// Frames are written whole and in queue order, so two publishes never
/// interleave bytes on the wire.
pub struct StreamRecipient {
    queue: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    capacity: usize,
    cut_off: Arc<watch::Sender<bool>>,
    writer_task: Mutex<Option<JoinHandle<()>>>,
    close_grace: Duration,
}

impl StreamRecipient {
    /// Spawns the writer task for `writer`.
    ///
    /// `capacity` is the number of frames that may wait in the queue; zero is
    /// treated as one.
    pub fn new<W>(writer: FrameWriter<W>, capacity: usize, write_timeout: Option<Duration>) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let capacity = capacity.max(1);
        let (queue, pending) = mpsc::channel(capacity);
        let (cut_off, _) = watch::channel(false);
        let cut_off = Arc::new(cut_off);

        let writer_task = tokio::spawn(drain_queue(
            writer,
            pending,
            write_timeout,
            Arc::clone(&cut_off),
        ));

        Self {
            queue: Mutex::new(Some(queue)),
            capacity,
            cut_off,
            writer_task: Mutex::new(Some(writer_task)),
            close_grace: write_timeout.map_or(DEFAULT_CLOSE_GRACE, |t| t.min(DEFAULT_CLOSE_GRACE)),
        }
    }

    /// `true` once the peer has been dropped for falling behind or failing a
    /// write.
    pub fn is_cut_off(&self) -> bool {
        *self.cut_off.borrow()
    }

    /// Resolves once the peer is cut off.
    pub async fn cut_off(&self) {
        let mut flag = self.cut_off.subscribe();
        // `self` owns the sender, so this only returns once the flag is set.
        let _ = flag.wait_for(|cut| *cut).await;
    }

    /// Stops accepting payloads, lets the writer flush what is queued, and
    /// shuts the write direction down so the peer sees end of stream.
    ///
    /// A peer that does not drain within the close grace (or is already cut
    /// off) is abandoned instead.  Calling `close` again does nothing.
    pub async fn close(&self) {
        drop(lock(&self.queue).take());

        let Some(mut task) = lock(&self.writer_task).take() else {
            return;
        };
        if self.is_cut_off() {
            task.abort();
            return;
        }

        match timeout(self.close_grace, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("peer writer task failed: {e}"),
            Err(_) => {
                debug!(
                    grace = ?self.close_grace,
                    "peer did not drain its queue in time; abandoning it"
                );
                task.abort();
            }
        }
    }
}

impl Drop for StreamRecipient {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.writer_task).take() {
            task.abort();
        }
    }
}

#[async_trait]
impl Recipient for StreamRecipient {
    async fn deliver(&self, payload: &[u8]) -> Result<(), DeliveryError> {
        if self.is_cut_off() {
            return Err(DeliveryError::Closed);
        }
        let queue = lock(&self.queue);
        let Some(sender) = queue.as_ref() else {
            return Err(DeliveryError::Closed);
        };

        match sender.try_send(payload.to_vec()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.cut_off.send_replace(true);
                Err(DeliveryError::Backlogged(self.capacity))
            }
            Err(TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Writer task body: writes queued frames until the queue closes, then shuts
/// the stream down.  Any write failure cuts the peer off.
async fn drain_queue<W>(
    mut writer: FrameWriter<W>,
    mut pending: mpsc::Receiver<Vec<u8>>,
    write_timeout: Option<Duration>,
    cut_off: Arc<watch::Sender<bool>>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(payload) = pending.recv().await {
        if let Err(e) = write_bounded(&mut writer, &payload, write_timeout).await {
            debug!("write to peer failed: {e}");
            cut_off.send_replace(true);
            return;
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!("shutdown of peer stream failed: {e}");
    }
}

async fn write_bounded<W: AsyncWrite + Unpin>(
    writer: &mut FrameWriter<W>,
    payload: &[u8],
    limit: Option<Duration>,
) -> Result<(), DeliveryError> {
    match limit {
        Some(limit) => timeout(limit, writer.write_frame(payload))
            .await
            .map_err(|_| DeliveryError::Timeout(limit))??,
        None => writer.write_frame(payload).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanchat_core::FrameReader;

    #[tokio::test]
    async fn test_deliver_writes_one_frame_then_close_ends_stream() {
        // Arrange
        let (local, remote) = tokio::io::duplex(256);
        let recipient = StreamRecipient::new(FrameWriter::new(local), 8, None);
        let mut reader = FrameReader::new(remote);

        // Act
        recipient.deliver(b"bob:hey").await.unwrap();
        recipient.close().await;

        // Assert
        assert_eq!(reader.read_frame().await.unwrap().unwrap(), b"bob:hey");
        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deliver_returns_immediately_when_peer_stops_reading() {
        // Arrange: an 8-byte pipe that nobody drains and a two-frame queue
        let (local, _remote) = tokio::io::duplex(8);
        let recipient = StreamRecipient::new(FrameWriter::new(local), 2, None);

        // Act: the writer cannot flush, so the queue fills
        let mut results = Vec::new();
        for _ in 0..4 {
            let attempt = timeout(Duration::from_secs(1), recipient.deliver(&[0u8; 64]));
            results.push(attempt.await.expect("deliver waited on the peer"));
        }

        // Assert
        assert!(results.iter().any(|r| matches!(r, Err(DeliveryError::Backlogged(2)))));
        assert!(recipient.is_cut_off());
        assert!(matches!(
            recipient.deliver(b"more").await,
            Err(DeliveryError::Closed)
        ));
        timeout(Duration::from_secs(1), recipient.cut_off())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_write_timeout_cuts_peer_off() {
        let (local, _remote) = tokio::io::duplex(8);
        let recipient =
            StreamRecipient::new(FrameWriter::new(local), 8, Some(Duration::from_millis(50)));

        recipient.deliver(&[0u8; 64]).await.unwrap();

        timeout(Duration::from_secs(2), recipient.cut_off())
            .await
            .expect("write timeout never cut the peer off");
    }

    #[tokio::test]
    async fn test_write_to_closed_peer_cuts_it_off() {
        let (local, remote) = tokio::io::duplex(64);
        drop(remote);
        let recipient = StreamRecipient::new(FrameWriter::new(local), 8, None);

        recipient.deliver(b"anyone?").await.unwrap();

        timeout(Duration::from_secs(1), recipient.cut_off())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_gives_up_on_peer_that_never_drains() {
        // Arrange: the writer is stuck on a full pipe, but the queue has room
        let (local, _remote) = tokio::io::duplex(8);
        let recipient = StreamRecipient::new(FrameWriter::new(local), 8, None);
        recipient.deliver(&[0u8; 64]).await.unwrap();

        // Act
        let closed = timeout(DEFAULT_CLOSE_GRACE * 2, recipient.close()).await;

        // Assert
        assert!(closed.is_ok(), "close() waited past its grace period");
        assert!(matches!(
            recipient.deliver(b"late").await,
            Err(DeliveryError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_close_twice_is_harmless() {
        let (local, remote) = tokio::io::duplex(64);
        let recipient = StreamRecipient::new(FrameWriter::new(local), 8, None);
        let mut reader = FrameReader::new(remote);

        recipient.close().await;
        recipient.close().await;

        assert!(reader.read_frame().await.unwrap().is_none());
    }
}
