//! Configuration types

use std::time::Duration;

use crate::types::{BufferSize, DialRetry, Secret};

/// Everything the gateway reads at startup
///
/// Built by [`super::load_config`]; fields are validated and clamped
/// there so holders can rely on them without re-checking.
#[derive(Debug, Clone)]
pub struct Config {
    /// Key material for token decryption
    pub secret: Secret,
    /// Where the listener listens
    pub listen_addr: String,
    /// Enable SO_REUSEPORT on the listener
    pub reuse_port: bool,
    /// Max dial attempts per connection
    pub dial_retry: DialRetry,
    /// Per-attempt dial deadline
    pub dial_timeout: Duration,
    /// Size of each pooled relay buffer
    pub buffer_size: BufferSize,
    /// Bind address for the diagnostics endpoint, if any
    pub diag_addr: Option<String>,
}
