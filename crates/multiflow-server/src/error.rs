//! Server error types.

use multiflow_core::errors::{
    ERROR_CONFIG, ERROR_CONNECTION, ERROR_DIAL, ERROR_PROTOCOL, ERROR_SOCKET, ERROR_TLS,
};

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Socket setup or accept failure.
    #[error("socket: {0}")]
    Socket(#[from] std::io::Error),
    /// Read/write failure on an established connection.
    #[error("connection: {0}")]
    Connection(std::io::Error),
    /// Backend unreachable after the full retry budget.
    #[error("dial: {addr} unreachable after {attempts} attempts: {source}")]
    Dial {
        addr: String,
        attempts: u32,
        source: std::io::Error,
    },
    #[error("tls: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),
    #[error("config: {0}")]
    Config(#[from] multiflow_config::ConfigError),
    #[error("cert: {0}")]
    Cert(#[from] multiflow_cert::CertError),
    /// Malformed HTTP from a client.
    #[error("protocol: malformed request")]
    Protocol,
}

impl ServerError {
    /// Error-kind label for log fields.
    pub fn error_kind(&self) -> &'static str {
        match self {
            ServerError::Socket(_) => ERROR_SOCKET,
            ServerError::Connection(_) => ERROR_CONNECTION,
            ServerError::Dial { .. } => ERROR_DIAL,
            ServerError::Tls(_) | ServerError::Cert(_) => ERROR_TLS,
            ServerError::Config(_) => ERROR_CONFIG,
            ServerError::Protocol => ERROR_PROTOCOL,
        }
    }
}
