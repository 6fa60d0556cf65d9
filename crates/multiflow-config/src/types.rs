//! Configuration type definitions for the listener, backends, TLS, and
//! logging.

use serde::{Deserialize, Serialize};

use crate::defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Access token handed to the validation entry point.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port for the proxy.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Host the backends live on.
    #[serde(default = "default_remote_host")]
    pub remote_host: String,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    #[serde(default = "default_openvpn_port")]
    pub openvpn_port: u16,
    #[serde(default = "default_v2ray_port")]
    pub v2ray_port: u16,
    /// Worker tasks consuming accepted connections.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Sniff/relay buffer size in bytes. Raised to the 16 KiB floor.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// File-descriptor limit requested at startup.
    #[serde(default = "default_fd_limit")]
    pub fd_limit: u64,
    /// Idle timeout in seconds for sniffing and relays.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Collapse every tunneled classification to the SSH backend.
    #[serde(default)]
    pub ssh_only: bool,
    /// Reply template for plain HTTP requests.
    #[serde(default = "default_response")]
    pub response: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            remote_host: default_remote_host(),
            ssh_port: default_ssh_port(),
            openvpn_port: default_openvpn_port(),
            v2ray_port: default_v2ray_port(),
            workers: default_workers(),
            buffer_size: default_buffer_size(),
            fd_limit: default_fd_limit(),
            idle_timeout_secs: default_idle_timeout_secs(),
            ssh_only: false,
            response: default_response(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Terminate TLS on the listening socket.
    #[serde(default)]
    pub enabled: bool,
    /// PEM file carrying both certificate chain and private key.
    /// Auto-generated when absent and TLS is enabled.
    #[serde(default)]
    pub cert: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace/debug/info/warn/error).
    #[serde(default)]
    pub level: Option<String>,
}
