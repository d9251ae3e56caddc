//! Shared error type across wsmux crates.

use thiserror::Error;

/// Stable error codes (metric labels, log fields, test assertions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// First bytes of a connection are not a WebSocket upgrade request.
    NotAHandshake,
    /// Requested scope is missing or its application is disabled.
    ScopeRejected,
    /// Frame length beyond what this implementation accepts.
    OversizedFrame,
    /// Accept-hash primitive unavailable or broken.
    MissingAlgorithm,
    /// Invalid configuration.
    BadConfig,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Socket level failure.
    Io,
    /// Internal server error.
    Internal,
}

impl ErrorCode {
    /// String representation used in metrics and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotAHandshake => "NOT_A_HANDSHAKE",
            ErrorCode::ScopeRejected => "SCOPE_REJECTED",
            ErrorCode::OversizedFrame => "OVERSIZED_FRAME",
            ErrorCode::MissingAlgorithm => "MISSING_ALGORITHM",
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Io => "IO",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, WsMuxError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum WsMuxError {
    #[error("not a websocket handshake: {0}")]
    NotAHandshake(String),
    #[error("scope rejected: {0}")]
    ScopeRejected(String),
    #[error("frame too large for this implementation (length {0})")]
    OversizedFrame(u64),
    #[error("accept hash algorithm is missing")]
    MissingAlgorithm,
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("io: {0}")]
    Io(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl WsMuxError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            WsMuxError::NotAHandshake(_) => ErrorCode::NotAHandshake,
            WsMuxError::ScopeRejected(_) => ErrorCode::ScopeRejected,
            WsMuxError::OversizedFrame(_) => ErrorCode::OversizedFrame,
            WsMuxError::MissingAlgorithm => ErrorCode::MissingAlgorithm,
            WsMuxError::BadConfig(_) => ErrorCode::BadConfig,
            WsMuxError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            WsMuxError::Io(_) => ErrorCode::Io,
            WsMuxError::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<std::io::Error> for WsMuxError {
    fn from(e: std::io::Error) -> Self {
        WsMuxError::Io(e.to_string())
    }
}
