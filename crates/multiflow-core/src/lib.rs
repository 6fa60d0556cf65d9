//! Core defaults and generic I/O shared across multiflow crates.
//!
//! This crate provides:
//! - Default timing/budget constants
//! - Error-kind label constants for log fields
//! - The bidirectional relay used by every tunneled connection

pub mod defaults;
pub mod errors;
pub mod io;

pub use defaults::*;
pub use errors::*;

/// Project name.
pub const PROJECT_NAME: &str = "multiflow";
/// Project version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
