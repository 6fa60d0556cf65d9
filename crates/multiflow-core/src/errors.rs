//! Error-kind label constants for log fields.
//!
//! One string per failure class so log lines classify consistently across
//! crates.

/// Invalid flag or configuration value.
pub const ERROR_ARGUMENT: &str = "argument";
/// Socket/bind/listen/accept failure.
pub const ERROR_SOCKET: &str = "socket";
/// Backend unreachable after the retry budget.
pub const ERROR_DIAL: &str = "dial";
/// TLS handshake or certificate load failure.
pub const ERROR_TLS: &str = "tls";
/// Read/write failure on an active connection.
pub const ERROR_CONNECTION: &str = "connection";
/// Malformed HTTP from a client.
pub const ERROR_PROTOCOL: &str = "protocol";
/// Configuration file or validation failure.
pub const ERROR_CONFIG: &str = "config";
