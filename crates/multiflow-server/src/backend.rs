//! Backend dialing with a bounded retry budget.

use multiflow_core::defaults::{DIAL_ATTEMPTS, DIAL_CONNECT_TIMEOUT, DIAL_RETRY_DELAY};
use multiflow_sniff::Protocol;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::error::ServerError;
use crate::state::ProxyState;

/// Map a tunneled protocol tag to its backend port.
pub fn backend_port(protocol: Protocol, state: &ProxyState) -> Option<u16> {
    match protocol {
        Protocol::Ssh => Some(state.ssh_port),
        Protocol::OpenVpn => Some(state.openvpn_port),
        Protocol::Vmess => Some(state.v2ray_port),
        _ => None,
    }
}

/// Dial the backend for `protocol`, retrying on failure.
///
/// Up to [`DIAL_ATTEMPTS`] connects, each bounded by
/// [`DIAL_CONNECT_TIMEOUT`], with [`DIAL_RETRY_DELAY`] between attempts.
/// A timed-out connect counts as a failed attempt.
pub async fn dial_backend(
    protocol: Protocol,
    state: &ProxyState,
) -> Result<TcpStream, ServerError> {
    let port = backend_port(protocol, state).ok_or_else(|| ServerError::Dial {
        addr: state.remote_host.clone(),
        attempts: 0,
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("protocol {} has no backend", protocol.name()),
        ),
    })?;
    let addr = format!("{}:{}", state.remote_host, port);

    let mut last_error = std::io::Error::new(std::io::ErrorKind::Other, "no dial attempted");
    for attempt in 1..=DIAL_ATTEMPTS {
        match tokio::time::timeout(DIAL_CONNECT_TIMEOUT, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                let _ = stream.set_nodelay(true);
                debug!(addr = %addr, attempt, protocol = protocol.name(), "backend connected");
                return Ok(stream);
            }
            Ok(Err(e)) => {
                warn!(addr = %addr, attempt, error = %e, "backend dial failed");
                last_error = e;
            }
            Err(_) => {
                warn!(addr = %addr, attempt, "backend dial timed out");
                last_error =
                    std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out");
            }
        }
        if attempt < DIAL_ATTEMPTS {
            tokio::time::sleep(DIAL_RETRY_DELAY).await;
        }
    }

    Err(ServerError::Dial {
        addr,
        attempts: DIAL_ATTEMPTS,
        source: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiflow_config::Config;

    fn state_with_ports(ssh: u16, openvpn: u16, v2ray: u16) -> ProxyState {
        let mut config = Config::default();
        config.server.ssh_port = ssh;
        config.server.openvpn_port = openvpn;
        config.server.v2ray_port = v2ray;
        ProxyState::from_config(&config)
    }

    #[test]
    fn port_map_follows_protocol() {
        let state = state_with_ports(22, 1194, 10086);
        assert_eq!(backend_port(Protocol::Ssh, &state), Some(22));
        assert_eq!(backend_port(Protocol::OpenVpn, &state), Some(1194));
        assert_eq!(backend_port(Protocol::Vmess, &state), Some(10086));
        assert_eq!(backend_port(Protocol::Http, &state), None);
        assert_eq!(backend_port(Protocol::Unknown, &state), None);
    }

    #[tokio::test]
    async fn successful_dial_returns_stream() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = state_with_ports(port, 1194, 10086);

        let stream = dial_backend(Protocol::Ssh, &state).await.unwrap();
        assert!(stream.peer_addr().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_typed_error() {
        // Bind then drop to find a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let state = state_with_ports(port, 1194, 10086);
        match dial_backend(Protocol::Ssh, &state).await {
            Err(ServerError::Dial { attempts, .. }) => assert_eq!(attempts, DIAL_ATTEMPTS),
            other => panic!("expected dial error, got {:?}", other.map(|_| ())),
        }
    }
}
