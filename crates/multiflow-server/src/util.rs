//! Listener construction, connection tracking, and process limits.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::warn;

use crate::error::ServerError;

/// Create the listening socket: AF_INET, address reuse, non-blocking,
/// bound to 0.0.0.0, backlog as large as the kernel will take (it clamps
/// to its somaxconn setting).
pub fn create_listener(port: u16) -> Result<TcpListener, ServerError> {
    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(i32::MAX)?;
    let listener = TcpListener::from_std(std::net::TcpListener::from(socket))?;
    Ok(listener)
}

/// Counts live connections so shutdown can drain them.
///
/// `track()` hands out a guard; the count drops when the guard does, on
/// every handler exit path.
#[derive(Clone, Default)]
pub struct ConnectionTracker {
    active: Arc<AtomicUsize>,
    drained: Arc<Notify>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and return its drop-guard.
    pub fn track(&self) -> ConnectionGuard {
        self.active.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            tracker: self.clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Wait until every tracked connection is gone, or the timeout passes.
    /// Returns whether the count reached zero.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.count() == 0 {
                return true;
            }
            let notified = self.drained.notified();
            if self.count() == 0 {
                return true;
            }
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(deadline) => return self.count() == 0,
            }
        }
    }

    fn release(&self) {
        if self.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drained.notify_waiters();
        }
    }
}

/// Decrements the tracked count on drop.
pub struct ConnectionGuard {
    tracker: ConnectionTracker,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.tracker.release();
    }
}

/// Ask the kernel for `limit` file descriptors. Best-effort: failure is
/// logged, not fatal, since the bind may still succeed under the inherited
/// limit.
#[cfg(unix)]
pub fn raise_fd_limit(limit: u64) {
    let rlim = libc::rlimit {
        rlim_cur: limit,
        rlim_max: limit,
    };
    // Safety: plain struct passed by pointer, no aliasing.
    let rc = unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &rlim) };
    if rc != 0 {
        warn!(
            limit,
            error = %std::io::Error::last_os_error(),
            "failed to raise file-descriptor limit"
        );
    }
}

#[cfg(not(unix))]
pub fn raise_fd_limit(_limit: u64) {}
