//! Plain-text diagnostics endpoint
//!
//! Bound only when `GW_PPROF_ADDR` is set. Answers every request with a
//! liveness snapshot; it shares nothing with the data path beyond
//! read-only counters.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::warn;

use crate::gateway::Gateway;

/// Bind the diagnostics listener. Failure is fatal at startup.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to set up diagnostics endpoint on {addr}"))
}

/// Serve liveness responses until the process exits.
pub async fn serve(listener: TcpListener, gateway: Arc<Gateway>) {
    let started = Instant::now();

    loop {
        let (mut stream, _) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                warn!(%error, "diagnostics accept failed");
                continue;
            }
        };

        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move {
            // Drain the request head; the path doesn't matter
            let mut request = [0u8; 512];
            let _ = stream.read(&mut request).await;

            let body = format!(
                "uptime_seconds: {}\nactive_connections: {}\ntotal_connections: {}\n",
                started.elapsed().as_secs(),
                gateway.active_connections(),
                gateway.total_connections(),
            );
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
        });
    }
}
