use std::io;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("cannot connect to converter at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("converter handshake failed: {0}")]
    Handshake(String),

    #[error("converter transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("converter did not answer within {0:?}")]
    Timeout(Duration),

    #[error("malformed converter message: {0}")]
    Protocol(String),

    #[error("converter rejected expression: {0}")]
    Remote(String),

    #[error("converter returned no result")]
    NoResult,

    #[error("not connected to converter")]
    NotConnected,
}

impl GatewayError {
    /// Map an I/O failure, turning socket timeouts into [`GatewayError::Timeout`].
    pub fn from_io(err: io::Error, timeout: Duration) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => GatewayError::Timeout(timeout),
            _ => GatewayError::Transport(err),
        }
    }

    /// Short stable label for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Connect { .. } => "connect",
            GatewayError::Handshake(_) => "handshake",
            GatewayError::Transport(_) => "transport",
            GatewayError::Timeout(_) => "timeout",
            GatewayError::Protocol(_) => "protocol",
            GatewayError::Remote(_) => "remote",
            GatewayError::NoResult => "no_result",
            GatewayError::NotConnected => "not_connected",
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(value: serde_json::Error) -> Self {
        GatewayError::Protocol(value.to_string())
    }
}
