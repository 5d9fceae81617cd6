//! Infrastructure layer for the relay server.
//!
//! Contains the OS-facing adapters: the TCP listener, the per-connection
//! handler, the socket-backed recipient, and TOML configuration loading.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `lanchat_core`, but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod storage;
