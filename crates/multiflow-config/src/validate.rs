//! Configuration validation, applied after file and flag layering.

use multiflow_core::MIN_BUFFER_SIZE;

use crate::loader::ConfigError;
use crate::Config;

/// Validate the layered configuration, raising the buffer floor in place.
pub fn validate_config(config: &mut Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::Validation("server.port must be 1..=65535".into()));
    }
    if config.server.workers == 0 {
        return Err(ConfigError::Validation("server.workers must be > 0".into()));
    }
    if config.server.remote_host.trim().is_empty() {
        return Err(ConfigError::Validation("server.remote_host is empty".into()));
    }
    if config.server.ssh_port == 0
        || config.server.openvpn_port == 0
        || config.server.v2ray_port == 0
    {
        return Err(ConfigError::Validation("backend ports must be > 0".into()));
    }
    if config.server.idle_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "server.idle_timeout_secs must be > 0".into(),
        ));
    }
    if config.server.fd_limit == 0 {
        return Err(ConfigError::Validation("server.fd_limit must be > 0".into()));
    }
    if config.server.response.is_empty() {
        return Err(ConfigError::Validation("server.response is empty".into()));
    }
    if let Some(cert) = &config.tls.cert {
        if cert.trim().is_empty() {
            return Err(ConfigError::Validation("tls.cert is empty".into()));
        }
    }
    // Undersized buffers caused premature closes in the field; raise
    // rather than reject.
    if config.server.buffer_size < MIN_BUFFER_SIZE {
        config.server.buffer_size = MIN_BUFFER_SIZE;
    }
    Ok(())
}
