//! Default configuration values, as consts plus the serde default helpers
//! that reference them.

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;
/// Default worker task count.
pub const DEFAULT_WORKERS: usize = 4;
/// Default sniff/relay buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 16384;
/// Default file-descriptor limit requested at startup.
pub const DEFAULT_FD_LIMIT: u64 = 65536;
/// Default idle timeout, seconds, for sniffing and relays.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Default SSH backend port.
pub const DEFAULT_SSH_PORT: u16 = 22;
/// Default OpenVPN backend port.
pub const DEFAULT_OPENVPN_PORT: u16 = 1194;
/// Default VMess backend port.
pub const DEFAULT_V2RAY_PORT: u16 = 10086;
/// Default backend host.
pub const DEFAULT_REMOTE_HOST: &str = "127.0.0.1";

/// Default reply for plain HTTP requests.
pub const DEFAULT_HTTP_RESPONSE: &str = "HTTP/1.1 200 OK\r\n\r\n";

pub(crate) fn default_port() -> u16 {
    DEFAULT_PORT
}
pub(crate) fn default_workers() -> usize {
    DEFAULT_WORKERS
}
pub(crate) fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}
pub(crate) fn default_fd_limit() -> u64 {
    DEFAULT_FD_LIMIT
}
pub(crate) fn default_idle_timeout_secs() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECS
}
pub(crate) fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}
pub(crate) fn default_openvpn_port() -> u16 {
    DEFAULT_OPENVPN_PORT
}
pub(crate) fn default_v2ray_port() -> u16 {
    DEFAULT_V2RAY_PORT
}
pub(crate) fn default_remote_host() -> String {
    DEFAULT_REMOTE_HOST.to_string()
}
pub(crate) fn default_response() -> String {
    DEFAULT_HTTP_RESPONSE.to_string()
}
