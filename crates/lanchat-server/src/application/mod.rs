//! Application layer of the relay server.
//!
//! # What lives here? (for beginners)
//!
//! This layer holds the rules of the chat room without touching a socket:
//! who is connected, what has been said, and who should hear each event.
//! Delivery to a real connection goes through the [`recipient::Recipient`]
//! trait, so the relay can be exercised in unit tests with mocks and the
//! TCP details stay in `infrastructure`.
//!
//! # Sub-modules
//!
//! - **`recipient`** – The delivery seam: "send this payload to one peer".
//!
//! - **`registry`**  – The set of sessions that completed the handshake,
//!   plus the connection-id allocator.
//!
//! - **`history`**   – The ordered, optionally bounded, log of every event
//!   the relay has published.
//!
//! - **`relay`**     – `publish`: record the event, snapshot the registry,
//!   and fan the payload out to the selected audience.

pub mod history;
pub mod recipient;
pub mod registry;
pub mod relay;

pub use history::History;
pub use recipient::{DeliveryError, Recipient};
pub use registry::{
    ActiveSession, ConnectionId, ConnectionIdAllocator, RegistryError, SessionHandle,
    SessionRegistry,
};
pub use relay::{Audience, BroadcastRelay, DeliveryReport};
