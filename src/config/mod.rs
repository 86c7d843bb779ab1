//! Configuration module
//!
//! Captures the gateway's startup configuration from an optional TOML
//! file with environment-variable precedence, the usual arrangement for
//! container deployments. All values are read once; there is no runtime
//! reconfiguration.

mod loading;
mod types;

pub use loading::{load_config, DEFAULT_LISTEN_ADDR};
pub use types::Config;
