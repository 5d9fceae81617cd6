//! Async framed reads and writes over a byte stream.
//!
//! TCP is a *stream* protocol: a single `read()` may return part of a frame,
//! or the tail of one frame plus the head of the next.  [`FrameReader`]
//! always reads the 4-byte prefix first and then exactly the declared number
//! of payload bytes, so frame boundaries survive any split or coalescing the
//! network applies.
//!
//! Both halves are generic over tokio's `AsyncRead` / `AsyncWrite`, so the
//! same code runs over a real `TcpStream`, a `tokio::io::duplex` pipe, or a
//! scripted `tokio_test::io::Mock`.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::trace;

use crate::protocol::frame::{encode_frame, parse_length_prefix, FrameError, LENGTH_PREFIX_SIZE};

/// Splits a TCP stream into an independently owned frame reader and writer.
///
/// The reader goes to the task that drives the connection; the writer can be
/// moved behind an `Arc<Mutex<_>>` and shared with whoever delivers frames.
pub fn split_tcp(stream: TcpStream) -> (FrameReader<OwnedReadHalf>, FrameWriter<OwnedWriteHalf>) {
    let (read_half, write_half) = stream.into_split();
    (FrameReader::new(read_half), FrameWriter::new(write_half))
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// Reads whole frames from an async byte stream.
pub struct FrameReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reads the next frame.
    ///
    /// Returns `Ok(None)` when the peer closed the stream cleanly on a frame
    /// boundary.  The future is not cancel-safe: dropping it mid-frame loses
    /// the bytes already consumed, so callers only cancel it when they are
    /// about to abandon the connection anyway.
    ///
    /// # Errors
    ///
    /// - [`FrameError::FrameTooLarge`] if the prefix declares more than the
    ///   cap; no payload byte is read in that case.
    /// - [`FrameError::Io`] for stream failures, including an EOF that cuts a
    ///   frame short (`ErrorKind::UnexpectedEof`).
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        let mut filled = 0;

        while filled < LENGTH_PREFIX_SIZE {
            let n = self.inner.read(&mut prefix[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(FrameError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream closed inside a frame length prefix",
                )));
            }
            filled += n;
        }

        let payload_len = parse_length_prefix(prefix)?;

        let mut payload = vec![0u8; payload_len];
        self.inner.read_exact(&mut payload).await?;
        trace!(payload_len, "frame received");
        Ok(Some(payload))
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Writes whole frames to an async byte stream.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Encodes `payload` as one frame, writes it completely and flushes.
    ///
    /// # Errors
    ///
    /// - [`FrameError::FrameTooLarge`] if `payload` is over the cap; nothing
    ///   is written in that case, so the stream stays in sync.
    /// - [`FrameError::Io`] if the write fails.
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<(), FrameError> {
        let bytes = encode_frame(payload)?;
        self.inner.write_all(&bytes).await?;
        self.inner.flush().await?;
        trace!(payload_len = payload.len(), "frame sent");
        Ok(())
    }

    /// Shuts down the write direction, signalling EOF to the peer.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Io`] if the shutdown fails (for example, the
    /// peer already reset the connection).
    pub async fn shutdown(&mut self) -> Result<(), FrameError> {
        self.inner.shutdown().await?;
        Ok(())
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
