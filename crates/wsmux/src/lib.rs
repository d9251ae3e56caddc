//! Top-level facade crate for wsmux.
//!
//! Re-exports the protocol core and the gateway library so users can depend on a single crate.

pub mod core {
    pub use wsmux_core::*;
}

pub mod gateway {
    pub use wsmux_gateway::*;
}
