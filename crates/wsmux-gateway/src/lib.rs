//! wsmux gateway library entry.
//!
//! This crate wires the protocol core into a running listener: the per-socket
//! protocol router, the scope manager, configuration, the TCP transport, the
//! upstream hand-off, and ops endpoints. It is consumed by the binary
//! (`main.rs`) and by integration tests.

pub mod app_state;
pub mod classifier;
pub mod config;
pub mod obs;
pub mod ops;
pub mod scope;
pub mod transport;
pub mod upstream;
