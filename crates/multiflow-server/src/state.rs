//! Per-run state shared across connections.

use std::time::Duration;

use multiflow_config::Config;

/// Frozen values every connection handler needs, derived from the
/// validated configuration and shared as an `Arc`.
#[derive(Debug, Clone)]
pub struct ProxyState {
    pub remote_host: String,
    pub ssh_port: u16,
    pub openvpn_port: u16,
    pub v2ray_port: u16,
    pub ssh_only: bool,
    pub buffer_size: usize,
    pub idle_timeout: Duration,
    /// Reply bytes for plain HTTP requests.
    pub default_reply: Vec<u8>,
}

impl ProxyState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            remote_host: config.server.remote_host.clone(),
            ssh_port: config.server.ssh_port,
            openvpn_port: config.server.openvpn_port,
            v2ray_port: config.server.v2ray_port,
            ssh_only: config.server.ssh_only,
            buffer_size: config.server.buffer_size,
            idle_timeout: Duration::from_secs(config.server.idle_timeout_secs),
            default_reply: config.server.response.clone().into_bytes(),
        }
    }
}
