//! Gateway config loader.
//!
//! Every struct in [`schema`] rejects unknown keys, and a parsed config is
//! only returned after [`GatewayConfig::validate`] accepted it.

pub mod schema;

use std::fs;

use wsmux_core::error::{Result, WsMuxError};

pub use schema::{ControlPayloadMode, GatewayConfig, GatewaySection, OpsSection, ScopeConfig};

pub fn load_from_file(path: &str) -> Result<GatewayConfig> {
    let raw = fs::read_to_string(path)
        .map_err(|e| WsMuxError::BadConfig(format!("cannot read {path}: {e}")))?;
    let cfg = load_from_str(&raw)?;
    tracing::debug!(%path, scopes = cfg.scopes.len(), "config loaded");
    Ok(cfg)
}

pub fn load_from_str(raw: &str) -> Result<GatewayConfig> {
    serde_yaml::from_str::<GatewayConfig>(raw)
        .map_err(|e| WsMuxError::BadConfig(format!("invalid yaml: {e}")))
        .and_then(|cfg| cfg.validate().map(|()| cfg))
}
