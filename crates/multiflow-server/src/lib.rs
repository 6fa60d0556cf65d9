//! multiflow server library.
//!
//! Exposes the server implementation for integration tests and embedding.

mod backend;
mod error;
mod handler;
mod pool;
mod server;
mod state;
mod tls;
mod util;

pub use error::ServerError;
pub use pool::WorkerPool;
pub use server::{run_with_shutdown, serve};
pub use state::ProxyState;
pub use tokio_util::sync::CancellationToken;
pub use util::raise_fd_limit;
