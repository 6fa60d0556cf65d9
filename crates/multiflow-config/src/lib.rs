//! Configuration for the multiflow proxy.
//!
//! Layering order: built-in defaults, optional config file
//! (TOML/JSON/YAML), CLI flags. The result is validated once and then
//! frozen for the life of the process.

pub mod defaults;

mod cli;
mod loader;
mod types;
mod validate;

pub use cli::{apply_overrides, CliOverrides};
pub use loader::{load_config, ConfigError};
pub use types::{Config, LoggingConfig, ServerConfig, TlsConfig};
pub use validate::validate_config;
