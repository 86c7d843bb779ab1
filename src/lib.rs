//! # Relay Gateway
//!
//! A TCP relay gateway for clients that cannot (or may not) address their
//! backend directly. A client's first line is an encrypted token naming a
//! `host:port`; the gateway decrypts it, dials the backend, answers with
//! a 3-byte status code, and then relays bytes both ways until either
//! side closes.
//!
//! ## Architecture
//!
//! - **codec**: OpenSSL-compatible AES-256-CBC token encrypt/decrypt
//! - **config**: TOML file + `GW_*` environment loading, validated once
//! - **gateway**: accept loop, per-connection handshake, full-duplex relay
//! - **pool**: lock-free scratch buffer pool shared by all relay pumps
//! - **network**: listener construction (reuse-port aware)
//! - **diag**: optional plain-text liveness endpoint
//!
//! ## Wire protocol
//!
//! ```text
//! client -> gateway:  base64(Salted__ || salt || AES-256-CBC(secret, "host:port")) "\n" [early payload]
//! gateway -> client:  "200" | "400" | "401" | "502" | "504"
//! ```
//!
//! After a `200` the stream is a transparent byte relay in both
//! directions. After any other code the gateway closes without further
//! writes. Early payload (bytes that arrived after the `\n` in the same
//! read) is forwarded to the backend verbatim before any relaying.

pub mod codec;
pub mod config;
pub mod constants;
pub mod diag;
pub mod gateway;
pub mod logging;
pub mod network;
pub mod pool;
pub mod types;

pub use config::{load_config, Config};
pub use gateway::Gateway;
