//! Per-connection control loop.
//!
//! # Lifecycle (for beginners)
//!
//! ```text
//! AwaitingHandshake ──first frame──►  Joined  ──EOF / error / timeout / shutdown──►  Closed
//!        │                                                                              ▲
//!        └──────────────── EOF / error / timeout / shutdown ────────────────────────────┘
//! ```
//!
//! - **AwaitingHandshake**: the first frame is the username.  Nothing is
//!   published for a connection that never gets this far.
//! - **Joined**: the session is registered and `"<name> joined the chat"` is
//!   sent to everyone else.  Each further frame is one line of chat text,
//!   relayed to everyone else.
//! - **Closed**: the session is unregistered, `"<name> left the chat"` goes to
//!   everyone still connected, and the connection is shut down.
//!
//! Every read is raced against the server's shutdown signal and against the
//! peer being cut off for not keeping up with relayed frames, so either one
//! wakes a handler that is idle in a read.

use std::sync::Arc;
use std::time::Duration;

use lanchat_core::{ChatEvent, FrameError, FrameReader, FrameWriter};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::application::recipient::Recipient;
use crate::application::registry::ConnectionId;
use crate::application::relay::{Audience, BroadcastRelay};
use crate::infrastructure::network::stream_recipient::{StreamRecipient, DEFAULT_OUTBOUND_QUEUE};

/// Where a handler is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerState {
    AwaitingHandshake,
    Joined { username: String },
    Closed,
}

/// Why a handler reached [`HandlerState::Closed`].
#[derive(Debug)]
pub enum CloseReason {
    /// The peer closed its side cleanly.
    PeerClosed,
    /// A read failed, a frame was oversized, or a payload was not UTF-8.
    ReadFailed(FrameError),
    /// No frame arrived within the configured read timeout.
    IdleTimeout(Duration),
    /// The peer stopped accepting relayed frames: its outbound queue filled
    /// up, or a write failed or timed out.
    Unresponsive,
    /// The server is stopping.
    Shutdown,
    /// Registration was refused; see [`RegistryError`](crate::application::RegistryError).
    Rejected,
}

/// Per-connection options taken from the server configuration.
#[derive(Debug, Clone, Copy)]
pub struct HandlerSettings {
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    /// Frames that may wait for the peer before it is cut off.
    pub outbound_queue: usize,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            read_timeout: None,
            write_timeout: None,
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
        }
    }
}

enum ReadOutcome {
    Frame(Vec<u8>),
    Ended(CloseReason),
}

/// Drives one accepted connection from handshake to teardown.
pub struct ConnectionHandler<R> {
    id: ConnectionId,
    reader: FrameReader<R>,
    recipient: Arc<StreamRecipient>,
    relay: Arc<BroadcastRelay>,
    shutdown: watch::Receiver<bool>,
    read_timeout: Option<Duration>,
    state: HandlerState,
}

impl<R> ConnectionHandler<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Wraps an accepted connection.  Spawns the peer's writer task, so this
    /// must be called inside a Tokio runtime.
    pub fn new<W>(
        id: ConnectionId,
        reader: FrameReader<R>,
        writer: FrameWriter<W>,
        relay: Arc<BroadcastRelay>,
        shutdown: watch::Receiver<bool>,
        settings: HandlerSettings,
    ) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self {
            id,
            reader,
            recipient: Arc::new(StreamRecipient::new(
                writer,
                settings.outbound_queue,
                settings.write_timeout,
            )),
            relay,
            shutdown,
            read_timeout: settings.read_timeout,
            state: HandlerState::AwaitingHandshake,
        }
    }

    pub fn state(&self) -> &HandlerState {
        &self.state
    }

    /// Runs the connection to completion and reports why it closed.
    pub async fn run(mut self) -> CloseReason {
        let username = match self.next_text().await {
            Ok(username) => username,
            Err(reason) => {
                debug!(connection = %self.id, ?reason, "connection closed before handshake");
                self.close().await;
                return reason;
            }
        };

        let recipient: Arc<dyn Recipient> = self.recipient.clone();
        if let Err(e) = self
            .relay
            .registry()
            .register(self.id, username.clone(), recipient)
        {
            error!(connection = %self.id, "bug: {e}");
            self.close().await;
            return CloseReason::Rejected;
        }
        self.transition(HandlerState::Joined {
            username: username.clone(),
        });
        info!(connection = %self.id, %username, "{username} joined the chat");
        self.relay
            .publish(ChatEvent::Joined(username.clone()), Audience::AllExcept(self.id))
            .await;

        let reason = loop {
            match self.next_text().await {
                Ok(body) => {
                    debug!(connection = %self.id, "{username}: {body}");
                    self.relay
                        .publish(ChatEvent::text(username.clone(), body), Audience::AllExcept(self.id))
                        .await;
                }
                Err(reason) => break reason,
            }
        };

        match &reason {
            CloseReason::PeerClosed | CloseReason::Shutdown => {}
            other => warn!(connection = %self.id, %username, "closing connection: {other:?}"),
        }

        self.relay.registry().unregister(self.id);
        info!(connection = %self.id, %username, "{username} left the chat");
        self.relay
            .publish(ChatEvent::Left(username), Audience::Everyone)
            .await;
        self.close().await;
        reason
    }

    /// Reads the next frame and decodes it as UTF-8 text.
    async fn next_text(&mut self) -> Result<String, CloseReason> {
        match self.next_frame().await {
            ReadOutcome::Frame(payload) => String::from_utf8(payload).map_err(|e| {
                CloseReason::ReadFailed(FrameError::MalformedFrame(format!(
                    "payload is not valid UTF-8: {e}"
                )))
            }),
            ReadOutcome::Ended(reason) => Err(reason),
        }
    }

    async fn next_frame(&mut self) -> ReadOutcome {
        if *self.shutdown.borrow() {
            return ReadOutcome::Ended(CloseReason::Shutdown);
        }

        let read_timeout = self.read_timeout;
        let reader = &mut self.reader;
        let shutdown = &mut self.shutdown;
        let recipient = &self.recipient;

        tokio::select! {
            // A dropped sender also means the server is gone.
            _ = shutdown.changed() => ReadOutcome::Ended(CloseReason::Shutdown),
            _ = recipient.cut_off() => ReadOutcome::Ended(CloseReason::Unresponsive),
            outcome = read_bounded(reader, read_timeout) => outcome,
        }
    }

    async fn close(&mut self) {
        self.recipient.close().await;
        self.transition(HandlerState::Closed);
    }

    fn transition(&mut self, next: HandlerState) {
        debug!(connection = %self.id, from = ?self.state, to = ?next, "handler state change");
        self.state = next;
    }
}

async fn read_bounded<R: AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
    limit: Option<Duration>,
) -> ReadOutcome {
    let result = match limit {
        Some(limit) => match timeout(limit, reader.read_frame()).await {
            Ok(result) => result,
            Err(_) => return ReadOutcome::Ended(CloseReason::IdleTimeout(limit)),
        },
        None => reader.read_frame().await,
    };

    match result {
        Ok(Some(payload)) => ReadOutcome::Frame(payload),
        Ok(None) => ReadOutcome::Ended(CloseReason::PeerClosed),
        Err(e) => ReadOutcome::Ended(CloseReason::ReadFailed(e)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
