//! Session registry: the set of participants currently in the chat.
//!
//! A connection only becomes a *session* once its first frame (the username)
//! has arrived.  From then until the connection closes, the session sits in
//! the [`SessionRegistry`] and receives every broadcast addressed to it.
//!
//! # Concurrency model (for beginners)
//!
//! Every connection handler runs in its own tokio task, so several tasks
//! register, unregister, and snapshot at the same time.  The registry keeps
//! its map behind a `std::sync::Mutex`: every operation takes the lock, does a
//! small in-memory change, and releases it again before returning.  The lock
//! is never held across an `.await`, which is what makes a blocking mutex
//! safe to use inside async code.
//!
//! Broadcasting works on a [`snapshot_active`](SessionRegistry::snapshot_active)
//! copy, so a slow peer can never hold the registry lock while the relay
//! waits on its socket.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::debug;

use crate::application::recipient::Recipient;

// ── Connection identity ───────────────────────────────────────────────────────

/// Opaque identity of one accepted connection.
///
/// Ids are unique for the lifetime of the process and ordered by accept
/// time, which gives broadcasts a stable delivery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out [`ConnectionId`]s from a lock-free counter.
///
/// The first id is `#1`.
///
/// # Examples
///
/// ```rust
/// use lanchat_server::application::ConnectionIdAllocator;
///
/// let ids = ConnectionIdAllocator::new();
/// assert_eq!(ids.next().as_u64(), 1);
/// assert_eq!(ids.next().as_u64(), 2);
/// ```
#[derive(Debug)]
pub struct ConnectionIdAllocator {
    next: AtomicU64,
}

impl ConnectionIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Returns a fresh id.
    ///
    /// `Relaxed` ordering is enough: the id only has to be unique, it does not
    /// publish any other memory to the task that receives it.
    pub fn next(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Error type for registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The id is already registered.  Ids come from a single allocator, so
    /// this indicates a handler bug rather than a client mistake.
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),
}

// ── Sessions ──────────────────────────────────────────────────────────────────

/// Identity of a registered session, returned by `register` and `unregister`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub id: ConnectionId,
    pub username: String,
}

/// One entry of a registry snapshot: enough to deliver a payload and to log
/// who it went to.
#[derive(Clone)]
pub struct ActiveSession {
    pub id: ConnectionId,
    pub username: String,
    pub recipient: Arc<dyn Recipient>,
}

impl fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSession")
            .field("id", &self.id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

struct SessionEntry {
    username: String,
    recipient: Arc<dyn Recipient>,
}

/// Thread-safe map of every session that completed the handshake.
///
/// Usernames are not unique; two sessions may share a name.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<BTreeMap<ConnectionId, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateConnection`] if `id` is already
    /// present; the existing entry is left untouched.
    pub fn register(
        &self,
        id: ConnectionId,
        username: impl Into<String>,
        recipient: Arc<dyn Recipient>,
    ) -> Result<SessionHandle, RegistryError> {
        let username = username.into();
        let mut sessions = self.lock();
        if sessions.contains_key(&id) {
            return Err(RegistryError::DuplicateConnection(id));
        }
        sessions.insert(
            id,
            SessionEntry {
                username: username.clone(),
                recipient,
            },
        );
        debug!(connection = %id, %username, active = sessions.len(), "session registered");
        Ok(SessionHandle { id, username })
    }

    /// Removes a session, returning it if it was present.
    ///
    /// Unregistering an unknown id is a no-op.
    pub fn unregister(&self, id: ConnectionId) -> Option<SessionHandle> {
        let mut sessions = self.lock();
        let entry = sessions.remove(&id)?;
        debug!(connection = %id, username = %entry.username, active = sessions.len(), "session unregistered");
        Some(SessionHandle {
            id,
            username: entry.username,
        })
    }

    /// Returns a consistent copy of every registered session, ordered by id.
    ///
    /// Later registry changes do not affect a snapshot already taken.
    pub fn snapshot_active(&self) -> Vec<ActiveSession> {
        self.lock()
            .iter()
            .map(|(id, entry)| ActiveSession {
                id: *id,
                username: entry.username.clone(),
                recipient: Arc::clone(&entry.recipient),
            })
            .collect()
    }

    /// Usernames of all registered sessions, ordered by connection id.
    pub fn usernames(&self) -> Vec<String> {
        self.lock()
            .values()
            .map(|entry| entry.username.clone())
            .collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while the lock was held cannot leave the map half-updated
    // (every mutation is a single insert or remove), so a poisoned lock is
    // still safe to use.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<ConnectionId, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
