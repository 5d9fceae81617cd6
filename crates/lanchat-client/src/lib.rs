//! lanchat-client library entry point.
//!
//! The binary in `main.rs` is a thin terminal front end; everything it uses
//! lives here so integration tests can drive a session without a terminal.

pub mod application;
pub mod infrastructure;
