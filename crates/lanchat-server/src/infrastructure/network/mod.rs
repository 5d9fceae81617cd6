//! Network adapters: accepting TCP connections and driving each one.

pub mod handler;
pub mod listener;
pub mod stream_recipient;

pub use handler::{CloseReason, ConnectionHandler, HandlerSettings, HandlerState};
pub use listener::{bind_with_retry, BindError, RelayServer, ServerHandle, SHUTDOWN_NOTICE};
pub use stream_recipient::StreamRecipient;
