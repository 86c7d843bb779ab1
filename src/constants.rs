//! Constants used throughout the gateway
//!
//! This module centralizes magic numbers and protocol values
//! to improve maintainability and reduce duplication.

use std::time::Duration;

/// Buffer size constants
pub mod buffer {
    /// Size of the per-connection handshake window. The token line,
    /// delimiter included, must fit here.
    pub const TOKEN_WINDOW: usize = 256;

    /// Default size of a pooled relay buffer
    pub const RELAY_DEFAULT: usize = 8 * 1024;

    /// Smallest relay buffer the gateway will run with; configured
    /// values below this are raised to it
    pub const RELAY_FLOOR: usize = 1024;

    /// Idle buffers retained by the pool before excess ones are freed
    pub const MAX_POOLED: usize = 64;
}

/// Timeout and backoff constants
pub mod timing {
    use super::Duration;

    /// Default per-attempt deadline when dialing a backend
    pub const DIAL_TIMEOUT_DEFAULT: Duration = Duration::from_secs(3);

    /// First delay after a transient accept error
    pub const ACCEPT_BACKOFF_INITIAL: Duration = Duration::from_millis(5);

    /// Ceiling for the accept backoff; doubling stops here
    pub const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);
}

/// Handshake status codes, written to the client as the first bytes it
/// receives. The set is closed.
pub mod status {
    /// Backend dialed, relay follows
    pub const OK: &[u8; 3] = b"200";

    /// No token line within the handshake window, or the client went
    /// away before sending one
    pub const BAD_REQUEST: &[u8; 3] = b"400";

    /// Token did not decrypt to a usable address
    pub const BAD_ADDRESS: &[u8; 3] = b"401";

    /// Backend dial failed with a non-timeout error
    pub const DIAL_FAILED: &[u8; 3] = b"502";

    /// Every dial attempt timed out
    pub const DIAL_TIMEOUT: &[u8; 3] = b"504";
}
