//! # lanchat-core
//!
//! Shared library for the LAN chat relay containing the wire framing layer and
//! the chat event payload convention.
//!
//! This crate is used by both the server and the client.  It knows nothing
//! about sessions, registries, or terminals; it only turns byte streams into
//! frames and frames into chat events.
//!
//! # Architecture overview
//!
//! The relay is a star: every client opens one TCP connection to the server.
//! The first frame a client sends is its username; every later frame is one
//! line of chat text.  The server prefixes each line with the sender's name
//! and relays it to every other connected client.
//!
//! - **`protocol::frame`** – The pure codec.  A frame is a 4-byte big-endian
//!   length followed by that many payload bytes, capped at 64 KiB.
//!
//! - **`protocol::connection`** – Async readers and writers that apply the
//!   codec to a byte stream, reassembling frames that TCP split or coalesced.
//!
//! - **`protocol::event`** – How a [`ChatEvent`] (join, leave, text, notice)
//!   is rendered into a frame payload and parsed back on the client side.

pub mod protocol;

pub use protocol::connection::{split_tcp, FrameReader, FrameWriter};
pub use protocol::event::{ChatEvent, EventError, EventKind, SYSTEM_USERNAME};
pub use protocol::frame::{decode_frame, encode_frame, FrameError, MAX_FRAME_LEN};
