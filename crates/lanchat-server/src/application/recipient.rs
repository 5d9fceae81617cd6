//! The delivery seam between the relay and a peer connection.

use std::time::Duration;

use async_trait::async_trait;
use lanchat_core::FrameError;
use thiserror::Error;

/// Why a single delivery did not reach its peer.
///
/// A delivery error only ever affects the one recipient it came from; the
/// relay logs it and moves on to the next peer.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Framing or the underlying write failed.
    #[error("delivery failed: {0}")]
    Frame(#[from] FrameError),

    /// The peer did not accept the frame within the configured write timeout.
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    /// The peer's outbound queue was full; it is cut off from the chat.
    #[error("peer fell {0} frames behind")]
    Backlogged(usize),

    /// The peer's connection is already closing.
    #[error("peer connection is closed")]
    Closed,
}

/// Something the relay can hand a payload to.
///
/// The production implementation writes one frame to a TCP connection; tests
/// substitute `MockRecipient`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Recipient: Send + Sync {
    /// Delivers one payload as one frame.
    ///
    /// Must not wait on the peer: the relay calls this while holding its
    /// publish gate, so implementations hand the payload off and return.
    /// Concurrent calls on the same recipient must not interleave bytes of
    /// different frames.
    async fn deliver(&self, payload: &[u8]) -> Result<(), DeliveryError>;
}
