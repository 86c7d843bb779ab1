//! Gateway core: accept loop and per-connection handling
//!
//! One task per accepted connection, a shared lock-free buffer pool, and
//! nothing else shared on the hot path. No per-connection failure is
//! allowed to reach the accept loop; only a non-transient accept error
//! ends [`Gateway::run`], which the host program treats as fatal.

mod handshake;
mod relay;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::constants::timing;
use crate::network;
use crate::pool::BufferPool;
use crate::types::{ConnId, DialRetry, Secret};

/// The relay gateway: dial policy, secret, and shared buffer pool
#[derive(Debug)]
pub struct Gateway {
    secret: Secret,
    dial_retry: DialRetry,
    dial_timeout: Duration,
    buffer_pool: BufferPool,
    /// Connections currently inside their handler
    active_connections: AtomicUsize,
    /// Connections accepted since startup
    total_connections: AtomicU64,
}

impl Gateway {
    /// Build a gateway from validated configuration
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            secret: config.secret.clone(),
            dial_retry: config.dial_retry,
            dial_timeout: config.dial_timeout,
            buffer_pool: BufferPool::new(config.buffer_size),
            active_connections: AtomicUsize::new(0),
            total_connections: AtomicU64::new(0),
        }
    }

    /// Connections currently being handled
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Connections accepted since startup
    #[must_use]
    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    /// Accept loop. Transient accept errors back off exponentially from
    /// 5 ms to 1 s and the delay resets on success; anything else returns
    /// an error, which the host treats as fatal. Never returns otherwise.
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let mut backoff: Option<Duration> = None;

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => {
                    backoff = None;
                    accepted
                }
                Err(error) if network::is_transient_accept_error(&error) => {
                    let delay = match backoff {
                        None => timing::ACCEPT_BACKOFF_INITIAL,
                        Some(previous) => (previous * 2).min(timing::ACCEPT_BACKOFF_MAX),
                    };
                    backoff = Some(delay);
                    warn!(%error, delay_ms = delay.as_millis() as u64, "transient accept failure");
                    sleep(delay).await;
                    continue;
                }
                Err(error) => return Err(error).context("gateway accept failed"),
            };

            let gateway = Arc::clone(&self);
            let conn = ConnId::new();
            // The handler task contains panics; the watcher logs them
            let handler =
                tokio::spawn(async move { gateway.handle_client(stream, peer, conn).await });
            tokio::spawn(async move {
                if let Err(join_error) = handler.await {
                    if join_error.is_panic() {
                        error!(conn = %conn, "connection handler panicked: {join_error}");
                    }
                }
            });
        }
    }

    /// Handshake, then relay. Both sockets are owned here and close on
    /// every exit path when they drop.
    async fn handle_client(&self, mut client: TcpStream, peer: SocketAddr, conn: ConnId) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        debug!(conn = %conn, %peer, "connection accepted");

        match handshake::establish(
            &mut client,
            self.secret.as_bytes(),
            self.dial_retry,
            self.dial_timeout,
        )
        .await
        {
            Ok(backend) => relay::run(client, backend, &self.buffer_pool, conn).await,
            Err(error) => debug!(conn = %conn, %peer, %error, "handshake refused"),
        }

        self.active_connections.fetch_sub(1, Ordering::Relaxed);
        debug!(conn = %conn, %peer, "connection closed");
    }
}
