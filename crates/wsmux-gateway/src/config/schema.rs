use std::net::SocketAddr;

use serde::Deserialize;
use wsmux_core::error::{Result, WsMuxError};
use wsmux_core::protocol::frame::{ControlPayloads, DecoderLimits, MAX_SUPPORTED_LEN};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub ops: Option<OpsSection>,

    #[serde(default)]
    pub scopes: Vec<ScopeConfig>,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(WsMuxError::UnsupportedVersion);
        }
        if self.scopes.is_empty() {
            return Err(WsMuxError::BadConfig("scopes must not be empty".into()));
        }
        for s in &self.scopes {
            s.validate()?;
        }

        self.gateway.validate()?;
        if let Some(ops) = &self.ops {
            ops.listen_addr()?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_read_buffer_bytes")]
    pub read_buffer_bytes: usize,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: u64,

    #[serde(default = "default_max_handshake_bytes")]
    pub max_handshake_bytes: usize,

    #[serde(default)]
    pub control_payloads: ControlPayloadMode,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            read_buffer_bytes: default_read_buffer_bytes(),
            max_frame_bytes: default_max_frame_bytes(),
            max_handshake_bytes: default_max_handshake_bytes(),
            control_payloads: ControlPayloadMode::default(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if !(512..=65536).contains(&self.read_buffer_bytes) {
            return Err(WsMuxError::BadConfig(
                "gateway.read_buffer_bytes must be between 512 and 65536".into(),
            ));
        }
        if !(1..MAX_SUPPORTED_LEN).contains(&self.max_frame_bytes) {
            return Err(WsMuxError::BadConfig(format!(
                "gateway.max_frame_bytes must be between 1 and {}",
                MAX_SUPPORTED_LEN - 1
            )));
        }
        if !(256..=65536).contains(&self.max_handshake_bytes) {
            return Err(WsMuxError::BadConfig(
                "gateway.max_handshake_bytes must be between 256 and 65536".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|_| {
            WsMuxError::BadConfig(format!("gateway.listen is not a socket address: {}", self.listen))
        })
    }

    pub fn decoder_limits(&self) -> DecoderLimits {
        DecoderLimits {
            max_frame_bytes: self.max_frame_bytes,
            control_payloads: self.control_payloads.into(),
        }
    }
}

/// Ping/pong payload policy as written in YAML.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlPayloadMode {
    #[default]
    Fold,
    Drop,
}

impl From<ControlPayloadMode> for ControlPayloads {
    fn from(m: ControlPayloadMode) -> Self {
        match m {
            ControlPayloadMode::Fold => ControlPayloads::Fold,
            ControlPayloadMode::Drop => ControlPayloads::Drop,
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:5080".into()
}
fn default_read_buffer_bytes() -> usize {
    2048
}
fn default_max_frame_bytes() -> u64 {
    16 * 1024 * 1024
}
fn default_max_handshake_bytes() -> usize {
    wsmux_core::protocol::handshake::DEFAULT_MAX_HANDSHAKE_BYTES
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpsSection {
    pub listen: String,
}

impl OpsSection {
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|_| {
            WsMuxError::BadConfig(format!("ops.listen is not a socket address: {}", self.listen))
        })
    }
}

/// One application that may accept WebSocket upgrades.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeConfig {
    pub app: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl ScopeConfig {
    fn validate(&self) -> Result<()> {
        if self.app.is_empty() || self.app.contains('/') {
            return Err(WsMuxError::BadConfig(format!(
                "scope app must be a single non-empty path segment: {:?}",
                self.app
            )));
        }
        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}
