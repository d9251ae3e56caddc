//! Scope manager: which applications accept upgrades, and who is connected.

mod manager;

pub use manager::ScopeManager;
