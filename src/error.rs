//! Daemon-level error types.

use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors surfaced by command handlers.
///
/// Most protocol conditions are replied to in place and return `Ok(())`;
/// these variants are for conditions the connection loop must act on.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Client sent QUIT; tear the session down with this reason.
    #[error("client quit: {0:?}")]
    Quit(Option<String>),
    /// Close the connection silently (an ERROR frame was already queued).
    #[error("access denied")]
    AccessDenied,
    /// Internal fault; logged, treated as a protocol error, session survives.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for command handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// Errors on a server-to-server link.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] lark_proto::ProtocolError),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("remote error: {0}")]
    Remote(String),
    #[error("link closed")]
    Closed,
}
