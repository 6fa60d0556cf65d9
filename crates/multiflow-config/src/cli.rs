//! CLI override definitions and application logic.
//!
//! Every value is optional so the layering is: built-in defaults, then the
//! optional config file, then flags.

use clap::Parser;

use crate::Config;

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Listening port (default 8080)
    #[arg(long)]
    pub port: Option<u16>,
    /// Serve plain TCP (assumed when neither --http nor --https is given)
    #[arg(long, conflicts_with = "https")]
    pub http: bool,
    /// Terminate TLS on the listening socket
    #[arg(long)]
    pub https: bool,
    /// PEM file with certificate chain and private key (with --https;
    /// auto-generated when omitted)
    #[arg(long)]
    pub cert: Option<String>,
    /// Reply template for plain HTTP requests
    #[arg(long)]
    pub response: Option<String>,
    /// Worker task count (default 4)
    #[arg(long)]
    pub workers: Option<usize>,
    /// File-descriptor limit to request at startup (default 65536)
    #[arg(long)]
    pub ulimit: Option<u64>,
    /// Collapse every tunneled protocol to the SSH backend
    #[arg(long)]
    pub ssh_only: bool,
    /// Sniff/relay buffer size in bytes (minimum 16384)
    #[arg(long)]
    pub buffer_size: Option<usize>,
    /// SSH backend port (default 22)
    #[arg(long)]
    pub ssh_port: Option<u16>,
    /// OpenVPN backend port (default 1194)
    #[arg(long)]
    pub openvpn_port: Option<u16>,
    /// VMess backend port (default 10086)
    #[arg(long)]
    pub v2ray_port: Option<u16>,
    /// Host the backends live on (default 127.0.0.1)
    #[arg(long)]
    pub remote_host: Option<String>,
    /// Access token for the validation entry point
    #[arg(long)]
    pub token: Option<String>,
    /// Validate the configuration and exit without starting the proxy
    #[arg(long)]
    pub validate: bool,
    /// Idle timeout in seconds for sniffing and relays (default 300)
    #[arg(long)]
    pub idle_timeout: Option<u64>,
    /// Log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(v) = overrides.port {
        config.server.port = v;
    }
    if overrides.https {
        config.tls.enabled = true;
    } else if overrides.http {
        config.tls.enabled = false;
    }
    if let Some(v) = &overrides.cert {
        config.tls.cert = Some(v.clone());
    }
    if let Some(v) = &overrides.response {
        config.server.response = v.clone();
    }
    if let Some(v) = overrides.workers {
        config.server.workers = v;
    }
    if let Some(v) = overrides.ulimit {
        config.server.fd_limit = v;
    }
    if overrides.ssh_only {
        config.server.ssh_only = true;
    }
    if let Some(v) = overrides.buffer_size {
        config.server.buffer_size = v;
    }
    if let Some(v) = overrides.ssh_port {
        config.server.ssh_port = v;
    }
    if let Some(v) = overrides.openvpn_port {
        config.server.openvpn_port = v;
    }
    if let Some(v) = overrides.v2ray_port {
        config.server.v2ray_port = v;
    }
    if let Some(v) = &overrides.remote_host {
        config.server.remote_host = v.clone();
    }
    if let Some(v) = &overrides.token {
        config.token = Some(v.clone());
    }
    if let Some(v) = overrides.idle_timeout {
        config.server.idle_timeout_secs = v;
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(v.clone());
    }
}
