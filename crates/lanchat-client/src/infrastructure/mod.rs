//! Infrastructure layer for the chat client: the TCP session and the
//! terminal renderer.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `lanchat_core`, but MUST NOT be imported by the `application` layer.

pub mod console;
pub mod network;
