//! Listener socket construction and accept-error classification
//!
//! The listener is built with socket2 so SO_REUSEPORT can be set before
//! bind; tokio's own binder has no hook for that. Setup failures here are
//! fatal at startup by policy.

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use tokio::net::TcpListener;

/// Backlog passed to listen(2); admission control is the kernel's job
const LISTEN_BACKLOG: i32 = 1024;

/// Build the accepting socket and hand it to tokio.
///
/// `SO_REUSEADDR` is always set for quick restarts. `SO_REUSEPORT` is set
/// only when configured, and only on unix targets; elsewhere the flag is
/// rejected at startup rather than silently ignored.
pub fn bind_listener(addr: &str, reuse_port: bool) -> Result<TcpListener> {
    let socket_addr: SocketAddr = addr
        .to_socket_addrs()
        .with_context(|| format!("invalid listen address '{addr}'"))?
        .next()
        .with_context(|| format!("listen address '{addr}' resolved to nothing"))?;

    let domain = if socket_addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
        .context("failed to create listener socket")?;

    socket
        .set_reuse_address(true)
        .context("failed to set SO_REUSEADDR")?;

    if reuse_port {
        #[cfg(unix)]
        socket
            .set_reuse_port(true)
            .context("failed to set SO_REUSEPORT")?;

        #[cfg(not(unix))]
        anyhow::bail!("reuse-port is not supported on this platform");
    }

    socket
        .set_nonblocking(true)
        .context("failed to set non-blocking")?;
    socket
        .bind(&socket_addr.into())
        .with_context(|| format!("failed to bind {socket_addr}"))?;
    socket
        .listen(LISTEN_BACKLOG)
        .with_context(|| format!("failed to listen on {socket_addr}"))?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener).context("failed to register listener with the runtime")
}

/// Whether an accept error is worth backing off and retrying.
///
/// A half-open connection torn down before we accepted it surfaces as one
/// of these kinds; anything else (bad file descriptor, exhausted
/// descriptors misreported, invalid socket state) is fatal to the loop.
#[must_use]
pub fn is_transient_accept_error(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral() {
        let listener = bind_listener("127.0.0.1:0", false).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_listener_accepts() {
        let listener = bind_listener("127.0.0.1:0", false).unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move { tokio::net::TcpStream::connect(addr).await });
        let (accepted, peer) = listener.accept().await.unwrap();
        assert_eq!(accepted.local_addr().unwrap(), addr);
        assert_eq!(client.await.unwrap().unwrap().peer_addr().unwrap(), addr);
        let _ = peer;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reuse_port_allows_second_bind() {
        let first = bind_listener("127.0.0.1:0", true).unwrap();
        let addr = first.local_addr().unwrap();
        let second = bind_listener(&addr.to_string(), true).unwrap();
        assert_eq!(second.local_addr().unwrap().port(), addr.port());
    }

    #[tokio::test]
    async fn test_bad_address_is_error() {
        assert!(bind_listener("not an address", false).is_err());
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient_accept_error(&io::Error::from(
            io::ErrorKind::ConnectionAborted
        )));
        assert!(is_transient_accept_error(&io::Error::from(
            io::ErrorKind::Interrupted
        )));
        assert!(!is_transient_accept_error(&io::Error::from(
            io::ErrorKind::PermissionDenied
        )));
    }
}
