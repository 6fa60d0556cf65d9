//! Default timing and budget constants.
//!
//! Operational defaults that the config crate does not expose as knobs live
//! here so server code and tests agree on one value.

use std::time::Duration;

/// Backend dial attempts before the client is given up on.
pub const DIAL_ATTEMPTS: u32 = 3;
/// Delay between backend dial attempts.
pub const DIAL_RETRY_DELAY: Duration = Duration::from_secs(2);
/// Per-attempt connect timeout. Kept within the retry delay budget.
pub const DIAL_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// TLS handshake timeout for accepted connections.
pub const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Graceful shutdown drain bound.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Floor for the sniff/relay buffer. Smaller buffers caused premature
/// closes against some clients, so undersized requests are raised to this.
pub const MIN_BUFFER_SIZE: usize = 16384;
