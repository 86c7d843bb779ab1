//! Configuration loading from a TOML file and environment variables
//!
//! Environment variables take precedence over the config file so
//! container deployments can override without editing files. Unparsable
//! values are fatal: a gateway that half-read its config must not start.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::constants::{buffer, timing};
use crate::types::{BufferSize, DialRetry, Secret};

use super::types::Config;

/// Listener default: every interface, kernel-assigned port
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:0";

/// On-disk shape; every field optional so env vars can fill the gaps
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    secret: Option<String>,
    listen_addr: Option<String>,
    reuse_port: Option<bool>,
    dial_retry: Option<u32>,
    /// Seconds, matching the env var
    dial_timeout: Option<u64>,
    buffer_size: Option<usize>,
    diag_addr: Option<String>,
}

/// Load configuration from an optional TOML file, then apply `GW_*`
/// environment overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut raw = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("failed to parse config file '{}'", path.display()))?
        }
        None => FileConfig::default(),
    };

    overlay_env(&mut raw, |name| std::env::var(name).ok())?;
    finalize(raw)
}

/// Apply environment overrides onto the file values. The lookup is
/// injected so tests can run without touching process-global state.
fn overlay_env<F>(raw: &mut FileConfig, var: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let set = |name: &str| var(name).filter(|v| !v.is_empty());

    if let Some(secret) = set("GW_SECRET") {
        raw.secret = Some(secret);
    }
    if let Some(addr) = set("GW_ADDR") {
        raw.listen_addr = Some(addr);
    }
    if let Some(reuse) = set("GW_REUSE_PORT") {
        raw.reuse_port = Some(reuse == "1");
    }
    if let Some(retry) = set("GW_DIAL_RETRY") {
        raw.dial_retry = Some(
            retry
                .parse()
                .with_context(|| format!("GW_DIAL_RETRY must be an integer, got '{retry}'"))?,
        );
    }
    if let Some(timeout) = set("GW_DIAL_TIMEOUT") {
        raw.dial_timeout = Some(
            timeout
                .parse()
                .with_context(|| format!("GW_DIAL_TIMEOUT must be seconds, got '{timeout}'"))?,
        );
    }
    if let Some(size) = set("GW_BUFF_SIZE") {
        raw.buffer_size = Some(
            size.parse()
                .with_context(|| format!("GW_BUFF_SIZE must be bytes, got '{size}'"))?,
        );
    }
    if let Some(addr) = set("GW_PPROF_ADDR") {
        raw.diag_addr = Some(addr);
    }
    Ok(())
}

/// Validate and clamp the merged values into a [`Config`]
fn finalize(raw: FileConfig) -> Result<Config> {
    let secret = match raw.secret {
        Some(secret) => Secret::new(secret.into_bytes()).context("GW_SECRET is required")?,
        None => bail!("GW_SECRET is required"),
    };

    let listen_addr = raw
        .listen_addr
        .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());

    let dial_retry = match raw.dial_retry {
        Some(0) => {
            warn!("dial retry 0 raised to 1; the gateway always dials at least once");
            DialRetry::DEFAULT
        }
        Some(n) => DialRetry::new(n).unwrap_or(DialRetry::DEFAULT),
        None => DialRetry::DEFAULT,
    };

    // 0 means "use the default", as in the original deployment tooling
    let dial_timeout = match raw.dial_timeout {
        Some(0) | None => timing::DIAL_TIMEOUT_DEFAULT,
        Some(secs) => Duration::from_secs(secs),
    };

    let buffer_size = match raw.buffer_size {
        Some(size) if size < buffer::RELAY_FLOOR => {
            warn!(
                configured = size,
                floor = buffer::RELAY_FLOOR,
                "relay buffer size raised to the floor"
            );
            BufferSize::new(buffer::RELAY_FLOOR).unwrap_or(BufferSize::DEFAULT)
        }
        Some(size) => BufferSize::new(size).unwrap_or(BufferSize::DEFAULT),
        None => BufferSize::DEFAULT,
    };

    info!(
        listen_addr = %listen_addr,
        reuse_port = raw.reuse_port.unwrap_or(false),
        dial_retry = %dial_retry,
        dial_timeout_secs = dial_timeout.as_secs(),
        buffer_size = %buffer_size,
        "configuration loaded"
    );

    Ok(Config {
        secret,
        listen_addr,
        reuse_port: raw.reuse_port.unwrap_or(false),
        dial_retry,
        dial_timeout,
        buffer_size,
        diag_addr: raw.diag_addr,
    })
}
