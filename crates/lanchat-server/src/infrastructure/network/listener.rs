//! TCP listener: binding, the accept loop, and graceful shutdown.
//!
//! # Port selection
//!
//! If the configured port is taken, the server tries the next ports in turn
//! (up to `bind_attempts` in total) and logs which one clients should use.
//!
//! # Shutdown sequence
//!
//! [`ServerHandle::stop`] performs, in order:
//!
//! 1. broadcast `SERVER:server shutting down` to every session,
//! 2. flip the shutdown `watch` channel, which stops the accept loop and
//!    wakes every handler blocked in a read,
//! 3. join every handler task (each publishes its own "left" event, gives
//!    its peer a short grace period to drain queued frames, and closes its
//!    socket),
//! 4. drop the listener, releasing the port.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use lanchat_core::{split_tcp, ChatEvent};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::application::registry::{ConnectionIdAllocator, SessionRegistry};
use crate::application::relay::{Audience, BroadcastRelay};
use crate::infrastructure::network::handler::{ConnectionHandler, HandlerSettings};
use crate::infrastructure::storage::config::{ConfigError, ServerConfig};

/// Text of the notice broadcast when the server stops.
pub const SHUTDOWN_NOTICE: &str = "server shutting down";

/// Error type for starting the server.
#[derive(Debug, Error)]
pub enum BindError {
    /// Every port in the retry range was already in use.
    #[error("no free port on {address} between {first} and {last}: {source}")]
    Exhausted {
        address: IpAddr,
        first: u16,
        last: u16,
        #[source]
        source: io::Error,
    },

    /// Binding failed for a reason other than the port being in use.
    #[error("failed to bind {addr}: {source}")]
    Io {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The bound listener could not report its local address.
    #[error("could not read the listener's local address: {0}")]
    LocalAddr(#[source] io::Error),

    /// The configured bind address is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Binds `address:port`, moving on to the following ports while they are in
/// use.
///
/// `attempts` is the total number of ports tried, including `port` itself;
/// zero is treated as one.  The range is cut short at `u16::MAX`.
///
/// # Errors
///
/// - [`BindError::Exhausted`] if every port tried was in use.
/// - [`BindError::Io`] for any other bind failure, without further retries.
pub async fn bind_with_retry(
    address: IpAddr,
    port: u16,
    attempts: u16,
) -> Result<TcpListener, BindError> {
    let mut last_tried = port;
    let mut last_error = None;

    for offset in 0..attempts.max(1) {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        last_tried = candidate;
        let addr = SocketAddr::new(address, candidate);

        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if offset > 0 {
                    warn!(
                        requested = port,
                        bound = candidate,
                        "port {port} was in use; clients should connect to port {candidate}"
                    );
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                debug!("port {candidate} is in use, trying the next one");
                last_error = Some(e);
            }
            Err(source) => return Err(BindError::Io { addr, source }),
        }
    }

    Err(BindError::Exhausted {
        address,
        first: port,
        last: last_tried,
        source: last_error
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::AddrInUse, "no port tried")),
    })
}

// ── Server ────────────────────────────────────────────────────────────────────

/// A bound, not yet running, relay server.
pub struct RelayServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    relay: Arc<BroadcastRelay>,
    settings: HandlerSettings,
}

impl RelayServer {
    /// Binds the listener described by `config`, applying the port retry
    /// policy.
    ///
    /// # Errors
    ///
    /// Returns [`BindError`] if the address is invalid or no port could be
    /// bound.
    pub async fn bind(config: &ServerConfig) -> Result<Self, BindError> {
        let address = config.bind_ip()?;
        let listener = bind_with_retry(
            address,
            config.network.port,
            config.network.bind_attempts,
        )
        .await?;
        Self::from_listener(listener, config)
    }

    /// Wraps an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::LocalAddr`] if the listener's local address
    /// cannot be read.
    pub fn from_listener(listener: TcpListener, config: &ServerConfig) -> Result<Self, BindError> {
        let local_addr = listener.local_addr().map_err(BindError::LocalAddr)?;
        let registry = Arc::new(SessionRegistry::new());
        let relay = Arc::new(BroadcastRelay::new(registry, config.history_capacity()));

        Ok(Self {
            listener,
            local_addr,
            relay,
            settings: HandlerSettings {
                read_timeout: config.read_timeout(),
                write_timeout: config.write_timeout(),
                outbound_queue: config.relay.outbound_queue,
            },
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn relay(&self) -> Arc<BroadcastRelay> {
        Arc::clone(&self.relay)
    }

    /// Spawns the accept loop and returns a handle to control it.
    pub fn start(self) -> ServerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        info!("chat relay listening on {}", self.local_addr);

        let accept_task = tokio::spawn(accept_loop(
            self.listener,
            Arc::clone(&self.relay),
            self.settings,
            shutdown_rx,
        ));

        ServerHandle {
            local_addr: self.local_addr,
            relay: self.relay,
            shutdown: shutdown_tx,
            accept_task,
        }
    }
}

/// Control handle for a running server.
///
/// Dropping the handle without calling [`stop`](Self::stop) also closes the
/// accept loop and every connection, but skips the shutdown notice and does
/// not wait for handlers to finish.
pub struct ServerHandle {
    local_addr: SocketAddr,
    relay: Arc<BroadcastRelay>,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn relay(&self) -> Arc<BroadcastRelay> {
        Arc::clone(&self.relay)
    }

    /// Stops the server and waits until every connection has been closed.
    pub async fn stop(self) {
        info!("stopping chat relay");
        self.relay
            .publish(ChatEvent::Notice(SHUTDOWN_NOTICE.to_string()), Audience::Everyone)
            .await;

        // `send` only fails when every receiver is gone, i.e. the accept loop
        // and all handlers already finished.
        let _ = self.shutdown.send(true);

        if let Err(e) = self.accept_task.await {
            error!("accept loop task failed: {e}");
        }
        info!("chat relay stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    relay: Arc<BroadcastRelay>,
    settings: HandlerSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    let ids = ConnectionIdAllocator::new();
    let mut handlers = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let id = ids.next();
                    info!(connection = %id, %peer, "new client connected");
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(connection = %id, "could not disable Nagle: {e}");
                    }
                    let (reader, writer) = split_tcp(stream);
                    let handler = ConnectionHandler::new(
                        id,
                        reader,
                        writer,
                        Arc::clone(&relay),
                        shutdown.clone(),
                        settings,
                    );
                    handlers.spawn(handler.run());
                }
                // Transient (e.g. out of file descriptors); keep serving.
                Err(e) => error!("accept error: {e}"),
            },

            Some(finished) = handlers.join_next(), if !handlers.is_empty() => {
                if let Err(e) = finished {
                    error!("connection handler task failed: {e}");
                }
            }
        }
    }

    debug!(remaining = handlers.len(), "accept loop stopped; joining handlers");
    while let Some(finished) = handlers.join_next().await {
        if let Err(e) = finished {
            error!("connection handler task failed: {e}");
        }
    }
    drop(listener);
}
