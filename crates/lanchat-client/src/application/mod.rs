//! Application layer of the chat client.
//!
//! - **`config`**       – Where to connect and as whom.
//! - **`presentation`** – The [`EventSink`](presentation::EventSink) seam that
//!   receives every decoded event, plus a channel-backed sink.
//! - **`username`**     – Validation of the name typed at the prompt.

pub mod config;
pub mod presentation;
pub mod username;

pub use config::ClientConfig;
pub use presentation::{ChannelSink, EventSink, IncomingEvent, SinkMessage};
pub use username::{validate_username, UsernameError};
