//! Transport boundary (TCP).
//!
//! Accepts sockets, reads chunks, and applies the router's actions. One task
//! per socket keeps a connection's bytes in order and on one worker.

pub mod tcp;

pub use tcp::serve;
