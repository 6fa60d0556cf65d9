//! Bidirectional byte relay between a client and a backend.
//!
//! Both directions are driven as independent poll-based state machines
//! inside one future, so back-pressure on one direction never stalls the
//! other. Each direction preserves byte order, retries partial writes until
//! drained, and half-closes its sink when its source reaches EOF. A shared
//! idle timer ends the relay when neither direction has moved data within
//! the timeout.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Instant;

/// One direction of the relay.
///
/// Flushes are deferred: a flush is issued only when the source has no more
/// data immediately available (`Pending`) or at EOF, batching several
/// read/write rounds into one flush. That matters for buffered sinks such
/// as TLS streams, where every flush is a record boundary.
enum FlowState {
    /// Waiting to read; carries bytes written since the last flush.
    Reading(usize),
    /// Draining the buffer into the sink: (written, filled, unflushed).
    Writing(usize, usize, usize),
    /// Flushing the sink: (bytes to report, source hit EOF).
    Flushing(usize, bool),
    /// Source is done; propagating the half-close to the sink.
    ShuttingDown,
    Done,
}

enum FlowEvent {
    /// Bytes reached the sink and were flushed.
    Moved(usize),
    /// EOF propagated; this direction is finished.
    Finished,
}

fn poll_flow<R, W>(
    cx: &mut Context<'_>,
    source: &mut R,
    sink: &mut W,
    buf: &mut [u8],
    state: &mut FlowState,
) -> Poll<io::Result<FlowEvent>>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    loop {
        match state {
            FlowState::Reading(unflushed) => {
                let unflushed = *unflushed;
                let mut read_buf = ReadBuf::new(buf);
                match Pin::new(&mut *source).poll_read(cx, &mut read_buf) {
                    Poll::Ready(Ok(())) => {
                        let n = read_buf.filled().len();
                        if n == 0 {
                            if unflushed > 0 {
                                *state = FlowState::Flushing(unflushed, true);
                            } else {
                                *state = FlowState::ShuttingDown;
                            }
                        } else {
                            *state = FlowState::Writing(0, n, unflushed);
                        }
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => {
                        if unflushed > 0 {
                            *state = FlowState::Flushing(unflushed, false);
                        } else {
                            return Poll::Pending;
                        }
                    }
                }
            }
            FlowState::Writing(written, filled, unflushed) => {
                let (filled, unflushed) = (*filled, *unflushed);
                match Pin::new(&mut *sink).poll_write(cx, &buf[*written..filled]) {
                    Poll::Ready(Ok(n)) => {
                        *written += n;
                        if *written >= filled {
                            // Whole chunk accepted; read again before flushing.
                            *state = FlowState::Reading(unflushed + filled);
                        }
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => return Poll::Pending,
                }
            }
            FlowState::Flushing(bytes, at_eof) => {
                let (bytes, at_eof) = (*bytes, *at_eof);
                match Pin::new(&mut *sink).poll_flush(cx) {
                    Poll::Ready(Ok(())) => {
                        *state = if at_eof {
                            FlowState::ShuttingDown
                        } else {
                            FlowState::Reading(0)
                        };
                        return Poll::Ready(Ok(FlowEvent::Moved(bytes)));
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => return Poll::Pending,
                }
            }
            FlowState::ShuttingDown => match Pin::new(&mut *sink).poll_shutdown(cx) {
                Poll::Ready(_) => {
                    *state = FlowState::Done;
                    return Poll::Ready(Ok(FlowEvent::Finished));
                }
                Poll::Pending => return Poll::Pending,
            },
            FlowState::Done => return Poll::Ready(Ok(FlowEvent::Finished)),
        }
    }
}

/// Bytes moved in each direction over the lifetime of one relay.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelayStats {
    /// Client → backend bytes.
    pub client_to_backend: u64,
    /// Backend → client bytes.
    pub backend_to_client: u64,
}

impl RelayStats {
    /// Total bytes moved in both directions.
    #[inline]
    pub fn total(self) -> u64 {
        self.client_to_backend + self.backend_to_client
    }
}

/// Pump bytes between `client` and `backend` until both directions finish
/// or the relay goes idle.
///
/// A direction finishes when its source reaches EOF and the half-close has
/// been propagated to its sink. Read/write errors end the whole relay; the
/// caller owns both streams, so both descriptors are released on every exit
/// path when they drop.
pub async fn relay_bidirectional<C, B>(
    client: C,
    backend: B,
    idle_timeout: Duration,
    buffer_size: usize,
) -> io::Result<RelayStats>
where
    C: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_r, mut client_w) = tokio::io::split(client);
    let (mut backend_r, mut backend_w) = tokio::io::split(backend);

    let mut up_buf = vec![0u8; buffer_size];
    let mut down_buf = vec![0u8; buffer_size];
    let mut up_state = FlowState::Reading(0);
    let mut down_state = FlowState::Reading(0);
    let mut up_done = false;
    let mut down_done = false;

    let idle = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle);

    let mut stats = RelayStats::default();

    loop {
        if up_done && down_done {
            return Ok(stats);
        }

        // Poll both directions under one waker registration each, so either
        // can make progress while the other is blocked.
        let both = std::future::poll_fn(|cx| {
            let mut any_ready = false;
            let mut moved = false;
            let mut failure: Option<io::Error> = None;

            if !up_done {
                match poll_flow(cx, &mut client_r, &mut backend_w, &mut up_buf, &mut up_state) {
                    Poll::Ready(Ok(FlowEvent::Moved(n))) => {
                        stats.client_to_backend += n as u64;
                        moved = true;
                        any_ready = true;
                    }
                    Poll::Ready(Ok(FlowEvent::Finished)) => {
                        up_done = true;
                        any_ready = true;
                    }
                    Poll::Ready(Err(e)) => {
                        failure = Some(e);
                        any_ready = true;
                    }
                    Poll::Pending => {}
                }
            }

            if !down_done {
                match poll_flow(cx, &mut backend_r, &mut client_w, &mut down_buf, &mut down_state) {
                    Poll::Ready(Ok(FlowEvent::Moved(n))) => {
                        stats.backend_to_client += n as u64;
                        moved = true;
                        any_ready = true;
                    }
                    Poll::Ready(Ok(FlowEvent::Finished)) => {
                        down_done = true;
                        any_ready = true;
                    }
                    Poll::Ready(Err(e)) => {
                        failure = Some(e);
                        any_ready = true;
                    }
                    Poll::Pending => {}
                }
            }

            if let Some(e) = failure {
                return Poll::Ready(Err(e));
            }
            if any_ready {
                Poll::Ready(Ok(moved))
            } else {
                Poll::Pending
            }
        });

        tokio::select! {
            result = both => {
                if result? {
                    idle.as_mut().reset(Instant::now() + idle_timeout);
                }
            }
            _ = &mut idle => {
                return Ok(stats);
            }
        }
    }
}
