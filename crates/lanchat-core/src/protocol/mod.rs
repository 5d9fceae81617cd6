//! Protocol module containing the frame codec, the async framed connection,
//! and the chat event payload convention.

pub mod connection;
pub mod event;
pub mod frame;

pub use connection::{split_tcp, FrameReader, FrameWriter};
pub use event::{ChatEvent, EventError, EventKind};
pub use frame::{decode_frame, encode_frame, FrameError, LENGTH_PREFIX_SIZE, MAX_FRAME_LEN};
