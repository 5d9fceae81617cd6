//! Network infrastructure for the chat client.
//!
//! Architecture:
//! - [`ClientSession`] owns the write half of the TCP connection; `send`
//!   writes one frame per chat line.
//! - A background receive loop owns the read half, decodes each frame into
//!   an [`IncomingEvent`] and hands it to the [`EventSink`].
//! - `disconnect` stops the loop, waits for it, and shuts the socket down.

use std::sync::Arc;

use lanchat_core::{split_tcp, FrameError, FrameReader, FrameWriter};
use thiserror::Error;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::presentation::{EventSink, IncomingEvent};

/// Errors that can occur in the client network layer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP connection to the server failed.
    #[error("failed to connect to server at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing a frame failed, or the line is too long for one frame.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The session was already disconnected.
    #[error("not connected to the server")]
    Disconnected,
}

/// A live connection to the relay server.
pub struct ClientSession {
    username: String,
    writer: Option<FrameWriter<OwnedWriteHalf>>,
    stop: watch::Sender<bool>,
    finished: watch::Receiver<bool>,
    receive_task: Option<JoinHandle<()>>,
}

impl ClientSession {
    /// Connects to `addr`, sends `username` as the handshake frame, and starts
    /// delivering relayed events to `sink`.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Connect`] if the TCP connection cannot be opened.
    /// - [`ClientError::Frame`] if the handshake frame cannot be written.
    pub async fn connect(
        addr: &str,
        username: &str,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not disable Nagle: {e}");
        }
        let (reader, mut writer) = split_tcp(stream);
        writer.write_frame(username.as_bytes()).await?;
        info!(%addr, %username, "connected to chat server");

        let (stop_tx, stop_rx) = watch::channel(false);
        let (finished_tx, finished_rx) = watch::channel(false);
        let receive_task = tokio::spawn(receive_loop(reader, sink, stop_rx, finished_tx));

        Ok(Self {
            username: username.to_string(),
            writer: Some(writer),
            stop: stop_tx,
            finished: finished_rx,
            receive_task: Some(receive_task),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// `false` once `disconnect` ran or the server closed the connection.
    pub fn is_connected(&self) -> bool {
        self.writer.is_some() && !*self.finished.borrow()
    }

    /// Sends one chat line.  There is no acknowledgement.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Disconnected`] after `disconnect`.
    /// - [`ClientError::Frame`] if the line is over the frame limit or the
    ///   write fails.
    pub async fn send(&mut self, text: &str) -> Result<(), ClientError> {
        let writer = self.writer.as_mut().ok_or(ClientError::Disconnected)?;
        writer.write_frame(text.as_bytes()).await?;
        Ok(())
    }

    /// Resolves once the receive loop has ended, for whatever reason.
    pub async fn closed(&self) {
        let mut finished = self.finished.clone();
        // An error means the loop's sender is gone, i.e. the loop ended.
        let _ = finished.wait_for(|done| *done).await;
    }

    /// Stops the receive loop, waits for it, and closes the connection.
    ///
    /// Calling it again has no effect.
    pub async fn disconnect(&mut self) {
        let Some(mut writer) = self.writer.take() else {
            return;
        };

        self.stop.send_replace(true);
        if let Some(task) = self.receive_task.take() {
            if let Err(e) = task.await {
                warn!("receive loop task failed: {e}");
            }
        }
        if let Err(e) = writer.shutdown().await {
            debug!("socket shutdown failed: {e}");
        }
        info!(username = %self.username, "disconnected from chat server");
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        // Ends a still-running receive loop; the socket closes with the halves.
        self.stop.send_replace(true);
    }
}

async fn receive_loop(
    mut reader: FrameReader<OwnedReadHalf>,
    sink: Arc<dyn EventSink>,
    mut stop: watch::Receiver<bool>,
    finished: watch::Sender<bool>,
) {
    loop {
        tokio::select! {
            _ = stop.changed() => {
                debug!("receive loop stopped locally");
                break;
            }
            frame = reader.read_frame() => match frame {
                Ok(Some(payload)) => dispatch(&payload, sink.as_ref()),
                Ok(None) => {
                    info!("server closed the connection");
                    sink.disconnected();
                    break;
                }
                Err(e) => {
                    warn!("connection to server lost: {e}");
                    sink.disconnected();
                    break;
                }
            },
        }
    }
    finished.send_replace(true);
}

fn dispatch(payload: &[u8], sink: &dyn EventSink) {
    let text = match std::str::from_utf8(payload) {
        Ok(text) => text,
        Err(e) => {
            warn!("dropping non UTF-8 frame: {e}");
            return;
        }
    };
    match IncomingEvent::from_payload(text) {
        Ok(event) => sink.render(event.kind, &event.username, &event.text),
        Err(e) => warn!("dropping frame: {e}"),
    }
}
