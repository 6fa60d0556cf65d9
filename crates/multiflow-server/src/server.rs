//! Accept loop and graceful shutdown.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use multiflow_core::defaults::{SHUTDOWN_TIMEOUT, TLS_HANDSHAKE_TIMEOUT};
use multiflow_config::Config;

use crate::error::ServerError;
use crate::handler::handle_conn;
use crate::pool::WorkerPool;
use crate::state::ProxyState;
use crate::tls::build_tls_acceptor;
use crate::util::{create_listener, ConnectionTracker};

/// Bind the configured port and serve until the token is cancelled.
pub async fn run_with_shutdown(
    config: Config,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let listener = create_listener(config.server.port)?;
    serve(listener, config, shutdown).await
}

/// Serve connections from an already-bound listener.
///
/// Split out from [`run_with_shutdown`] so tests and embedders can bind an
/// ephemeral port themselves.
pub async fn serve(
    listener: TcpListener,
    config: Config,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let tls_acceptor = if config.tls.enabled {
        Some(build_tls_acceptor(&config.tls)?)
    } else {
        None
    };

    let state = Arc::new(ProxyState::from_config(&config));
    let pool = WorkerPool::start(config.server.workers);
    let tracker = ConnectionTracker::new();
    let mut next_conn: u64 = 0;

    info!(
        address = %listener.local_addr()?,
        mode = if config.tls.enabled { "https" } else { "http" },
        workers = pool.workers(),
        ssh_only = config.server.ssh_only,
        "listening"
    );

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }

            result = listener.accept() => {
                let (tcp, peer) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                next_conn += 1;
                let conn = next_conn;
                debug!(conn, peer = %peer, "accepted");

                let guard = tracker.track();
                let state = state.clone();
                let acceptor = tls_acceptor.clone();

                let work = async move {
                    let _guard = guard;
                    let result = match acceptor {
                        Some(acceptor) => {
                            match tokio::time::timeout(TLS_HANDSHAKE_TIMEOUT, acceptor.accept(tcp)).await {
                                Ok(Ok(tls)) => handle_conn(tls, state, peer, conn).await,
                                Ok(Err(e)) => {
                                    warn!(conn, peer = %peer, error = %e, "TLS handshake failed");
                                    Ok(())
                                }
                                Err(_) => {
                                    warn!(conn, peer = %peer, "TLS handshake timed out");
                                    Ok(())
                                }
                            }
                        }
                        None => handle_conn(tcp, state, peer, conn).await,
                    };
                    match result {
                        Ok(()) => debug!(conn, peer = %peer, "connection closed"),
                        Err(err) => warn!(
                            conn,
                            peer = %peer,
                            kind = err.error_kind(),
                            error = %err,
                            "connection closed with error"
                        ),
                    }
                };
                if !pool.submit(work) {
                    debug!(conn, peer = %peer, "worker pool stopped, dropping connection");
                }
            }
        }
    }

    // Stop accepting before draining so nothing new sneaks in behind the
    // listener.
    drop(listener);

    let active = tracker.count();
    if active > 0 {
        info!(active, "waiting for connections to drain");
    }
    pool.stop(SHUTDOWN_TIMEOUT).await;
    if tracker.wait_for_drain(std::time::Duration::from_secs(1)).await {
        info!("all connections drained");
    } else {
        warn!(active = tracker.count(), "connections still active at shutdown");
    }

    info!("server stopped");
    Ok(())
}
