//! Per-connection lifecycle: sniff, reply, dial, relay.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use multiflow_core::io::relay_bidirectional;
use multiflow_sniff::{classify_request, sniff, Protocol, Reply};

use crate::backend::dial_backend;
use crate::error::ServerError;
use crate::state::ProxyState;

/// Drive one accepted connection to completion.
///
/// Reads opening bytes, classifies them, and either tunnels to a backend or
/// answers with the appropriate handshake reply and keeps sniffing. The
/// stream is generic so the TLS-terminated and plain paths share one
/// handler. Every exit path releases the client (and any backend) by drop.
pub async fn handle_conn<S>(
    mut stream: S,
    state: Arc<ProxyState>,
    peer: SocketAddr,
    conn: u64,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(state.buffer_size);
    let mut replied = false;

    loop {
        let read = tokio::time::timeout(state.idle_timeout, stream.read_buf(&mut buf)).await;
        let n = match read {
            Ok(result) => result.map_err(ServerError::Connection)?,
            Err(_) => {
                debug!(conn, peer = %peer, "idle while sniffing, closing");
                return Ok(());
            }
        };
        if n == 0 {
            return Ok(());
        }

        let protocol = sniff(&buf, state.ssh_only);
        if protocol.is_tunneled() {
            return tunnel(stream, buf, protocol, &state, peer, conn).await;
        }

        match classify_request(&buf, &state.default_reply) {
            Reply::Send(reply) => {
                debug!(conn, peer = %peer, bytes = reply.len(), "handshake reply sent, sniffing continues");
                stream
                    .write_all(&reply)
                    .await
                    .map_err(ServerError::Connection)?;
                stream.flush().await.map_err(ServerError::Connection)?;
                buf.clear();
                replied = true;
            }
            Reply::SendAndClose(reply) => {
                if replied {
                    // Post-handshake noise: ignore it and let the idle
                    // timeout reap the connection.
                    debug!(conn, peer = %peer, "unclassifiable bytes after reply, waiting for idle");
                    buf.clear();
                    continue;
                }
                stream
                    .write_all(&reply)
                    .await
                    .map_err(ServerError::Connection)?;
                stream.flush().await.map_err(ServerError::Connection)?;
                return Err(ServerError::Protocol);
            }
        }
    }
}

/// Dial the backend and splice the two streams together.
///
/// The opening bytes already consumed from the client are the first thing
/// written toward the backend, ahead of the relay.
async fn tunnel<S>(
    stream: S,
    initial: BytesMut,
    protocol: Protocol,
    state: &Arc<ProxyState>,
    peer: SocketAddr,
    conn: u64,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    debug!(conn, peer = %peer, protocol = protocol.name(), "tunneling");
    let mut backend = dial_backend(protocol, state).await?;

    if !initial.is_empty() {
        backend
            .write_all(&initial)
            .await
            .map_err(ServerError::Connection)?;
    }

    let stats = relay_bidirectional(stream, backend, state.idle_timeout, state.buffer_size)
        .await
        .map_err(ServerError::Connection)?;

    debug!(
        conn,
        peer = %peer,
        protocol = protocol.name(),
        to_backend = stats.client_to_backend + initial.len() as u64,
        to_client = stats.backend_to_client,
        "tunnel closed"
    );
    Ok(())
}
