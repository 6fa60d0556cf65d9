//! End-to-end tests for the multiflow proxy.
//!
//! Each test runs the real accept loop against mock backends on loopback:
//! direct SSH tunneling, the WebSocket handshake with an embedded protocol,
//! plain and malformed HTTP, backend dial failure, TLS termination, and
//! graceful drain.

use std::io::{Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use multiflow_config::Config;
use multiflow_server::{serve, CancellationToken, ServerError};

// ============================================================================
// Mock backends
// ============================================================================

/// TCP server that echoes back whatever it receives.
struct MockEchoServer {
    addr: SocketAddr,
    _handle: thread::JoinHandle<()>,
}

impl MockEchoServer {
    fn start() -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            for mut stream in listener.incoming().flatten() {
                thread::spawn(move || {
                    let mut buf = [0u8; 4096];
                    loop {
                        match stream.read(&mut buf) {
                            Ok(0) => break,
                            Ok(n) => {
                                if stream.write_all(&buf[..n]).is_err() {
                                    break;
                                }
                            }
                            Err(_) => break,
                        }
                    }
                });
            }
        });

        Self {
            addr,
            _handle: handle,
        }
    }

    fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Find a port with nothing listening on it.
fn dead_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

// ============================================================================
// Proxy harness
// ============================================================================

struct TestProxy {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl TestProxy {
    async fn start(config: Config) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(serve(listener, config, shutdown.clone()));
        // Give the accept loop a beat to come up.
        tokio::time::sleep(Duration::from_millis(20)).await;
        Self {
            addr,
            shutdown,
            handle,
        }
    }

    async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }

    async fn stop(self) {
        self.shutdown.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(10), self.handle).await;
    }
}

fn base_config() -> Config {
    let mut config = Config::default();
    config.server.workers = 2;
    config
}

async fn read_exactly(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    tokio::time::timeout(Duration::from_secs(5), stream.read_exact(&mut buf))
        .await
        .expect("timed out waiting for reply")
        .unwrap();
    buf
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn ssh_banner_tunnels_to_backend() {
    let backend = MockEchoServer::start();
    let mut config = base_config();
    config.server.ssh_port = backend.port();
    let proxy = TestProxy::start(config).await;

    let mut client = proxy.connect().await;
    let banner = b"SSH-2.0-OpenSSH_9.0\r\n";
    client.write_all(banner).await.unwrap();

    // The echo backend sends our banner straight back, proving the opening
    // bytes reached it intact and the return path works.
    let echoed = read_exactly(&mut client, banner.len()).await;
    assert_eq!(echoed, banner);

    client.write_all(b"more app bytes").await.unwrap();
    let echoed = read_exactly(&mut client, b"more app bytes".len()).await;
    assert_eq!(echoed, b"more app bytes");

    drop(client);
    proxy.stop().await;
}

#[tokio::test]
async fn websocket_upgrade_then_embedded_ssh() {
    let backend = MockEchoServer::start();
    let mut config = base_config();
    config.server.ssh_port = backend.port();
    let proxy = TestProxy::start(config).await;

    let mut client = proxy.connect().await;
    client
        .write_all(
            b"GET / HTTP/1.1\r\n\
              Host: x\r\n\
              Upgrade: websocket\r\n\
              Connection: Upgrade\r\n\
              Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
              \r\n",
        )
        .await
        .unwrap();

    let expected = b"HTTP/1.1 101 Switching Protocols\r\n\
                     Upgrade: websocket\r\n\
                     Connection: Upgrade\r\n\
                     Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\
                     \r\n";
    let reply = read_exactly(&mut client, expected.len()).await;
    assert_eq!(reply, expected);

    // The connection now carries the real protocol.
    client.write_all(b"SSH-2.0-Foo\r\n").await.unwrap();
    let echoed = read_exactly(&mut client, b"SSH-2.0-Foo\r\n".len()).await;
    assert_eq!(echoed, b"SSH-2.0-Foo\r\n");

    drop(client);
    proxy.stop().await;
}

#[tokio::test]
async fn plain_http_probe_gets_default_reply() {
    let proxy = TestProxy::start(base_config()).await;

    let mut client = proxy.connect().await;
    client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

    let expected = b"HTTP/1.1 200 OK\r\n\r\n";
    let reply = read_exactly(&mut client, expected.len()).await;
    assert_eq!(reply, expected);

    drop(client);
    proxy.stop().await;
}

#[tokio::test]
async fn configured_reply_overrides_default() {
    let mut config = base_config();
    config.server.response = "HTTP/1.1 204 No Content\r\n\r\n".into();
    let proxy = TestProxy::start(config).await;

    let mut client = proxy.connect().await;
    client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

    let expected = b"HTTP/1.1 204 No Content\r\n\r\n";
    let reply = read_exactly(&mut client, expected.len()).await;
    assert_eq!(reply, expected);

    drop(client);
    proxy.stop().await;
}

#[tokio::test]
async fn malformed_request_gets_400_and_close() {
    let proxy = TestProxy::start(base_config()).await;

    let mut client = proxy.connect().await;
    client.write_all(b"HELLO\r\n\r\n").await.unwrap();

    let expected = b"HTTP/1.1 400 Bad Request\r\n\r\n";
    let reply = read_exactly(&mut client, expected.len()).await;
    assert_eq!(reply, expected);

    // And then the proxy hangs up.
    let mut rest = Vec::new();
    let n = tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut rest))
        .await
        .expect("proxy did not close after 400")
        .unwrap();
    assert_eq!(n, 0);

    proxy.stop().await;
}

#[tokio::test]
async fn dial_failure_closes_client_without_reply() {
    let mut config = base_config();
    config.server.ssh_only = true;
    config.server.ssh_port = dead_port();
    let proxy = TestProxy::start(config).await;

    let mut client = proxy.connect().await;
    client.write_all(b"SSH-2.0-OpenSSH_9.0\r\n").await.unwrap();

    // Three attempts spaced two seconds apart, then the close.
    let mut rest = Vec::new();
    let n = tokio::time::timeout(Duration::from_secs(15), client.read_to_end(&mut rest))
        .await
        .expect("proxy did not close after dial failure")
        .unwrap();
    assert_eq!(n, 0, "client must see no bytes when the backend is down");

    proxy.stop().await;
}

#[tokio::test]
async fn tls_terminates_and_serves_http_reply() {
    // One PEM file carrying both certificate and key, as deployed.
    let dir = tempfile::tempdir().unwrap();
    let generated = multiflow_cert::generate_self_signed(dir.path()).unwrap();
    let combined = dir.path().join("combined.pem");
    let mut pem = std::fs::read_to_string(&generated.cert_path).unwrap();
    pem.push_str(&std::fs::read_to_string(&generated.key_path).unwrap());
    std::fs::write(&combined, pem).unwrap();

    let mut config = base_config();
    config.tls.enabled = true;
    config.tls.cert = Some(combined.to_string_lossy().into_owned());
    let proxy = TestProxy::start(config).await;

    // Client trusts exactly the generated certificate.
    let mut roots = RootCertStore::empty();
    let mut reader = std::io::BufReader::new(std::fs::File::open(&generated.cert_path).unwrap());
    for cert in rustls_pemfile::certs(&mut reader) {
        roots.add(cert.unwrap()).unwrap();
    }
    let client_config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(client_config));

    let tcp = proxy.connect().await;
    let server_name = ServerName::try_from("localhost").unwrap();
    let mut tls = connector.connect(server_name, tcp).await.unwrap();

    tls.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
    let expected = b"HTTP/1.1 200 OK\r\n\r\n";
    let mut reply = vec![0u8; expected.len()];
    tokio::time::timeout(Duration::from_secs(5), tls.read_exact(&mut reply))
        .await
        .expect("timed out waiting for TLS reply")
        .unwrap();
    assert_eq!(reply, expected);

    drop(tls);
    proxy.stop().await;
}

#[tokio::test]
async fn shutdown_drains_active_tunnel() {
    let backend = MockEchoServer::start();
    let mut config = base_config();
    config.server.ssh_port = backend.port();
    let proxy = TestProxy::start(config).await;

    let mut client = proxy.connect().await;
    client.write_all(b"SSH-2.0-OpenSSH_9.0\r\n").await.unwrap();
    let echoed = read_exactly(&mut client, b"SSH-2.0-OpenSSH_9.0\r\n".len()).await;
    assert_eq!(echoed, b"SSH-2.0-OpenSSH_9.0\r\n");

    // Stop accepting; the live tunnel must keep working.
    proxy.shutdown.cancel();
    tokio::time::sleep(Duration::from_millis(100)).await;

    client.write_all(b"still alive").await.unwrap();
    let echoed = read_exactly(&mut client, b"still alive".len()).await;
    assert_eq!(echoed, b"still alive");

    // New connections are refused once the listener is gone.
    assert!(TcpStream::connect(proxy.addr).await.is_err());

    // Closing the tunnel lets the server finish its drain.
    drop(client);
    let result = tokio::time::timeout(Duration::from_secs(10), proxy.handle)
        .await
        .expect("server did not drain after last tunnel closed")
        .unwrap();
    assert!(result.is_ok());
}
