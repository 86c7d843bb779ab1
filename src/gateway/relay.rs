//! Full-duplex byte relay between client and backend
//!
//! Two pumps, one per direction, race under `select!`: the first to see
//! end-of-stream or an error wins, and returning from here drops all four
//! halves, closing both sockets. The cancelled pump's buffer still goes
//! back to the pool through its drop. Nothing in here imposes a timeout;
//! sessions live as long as either peer keeps its half open.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::pool::BufferPool;
use crate::types::ConnId;

/// Relay bytes both ways until the first direction terminates, then tear
/// both streams down.
pub(crate) async fn run<C, B>(client: C, backend: B, pool: &BufferPool, conn: ConnId)
where
    C: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut backend_read, mut backend_write) = tokio::io::split(backend);

    let (direction, result) = tokio::select! {
        r = pump(&mut client_read, &mut backend_write, pool) => ("client->backend", r),
        r = pump(&mut backend_read, &mut client_write, pool) => ("backend->client", r),
    };

    match result {
        Ok(bytes) => debug!(conn = %conn, direction, bytes, "relay finished"),
        Err(error) => debug!(conn = %conn, direction, %error, "relay aborted"),
    }
}

/// One direction: read into pooled scratch, write out, repeat until EOF
/// or error. Only `&buffer[..n]` is ever interpreted; checkout contents
/// are stale by contract.
async fn pump<R, W>(reader: &mut R, writer: &mut W, pool: &BufferPool) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = pool.acquire();
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buffer[..]).await?;
        if n == 0 {
            // Flush our side's FIN before the select tears everything down
            let _ = writer.shutdown().await;
            return Ok(total);
        }
        writer.write_all(&buffer[..n]).await?;
        total += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BufferSize;

    fn small_pool() -> BufferPool {
        BufferPool::new(BufferSize::new(1024).unwrap())
    }

    #[tokio::test]
    async fn test_pump_copies_in_order() {
        let pool = small_pool();
        let (mut src_near, mut src_far) = tokio::io::duplex(64);
        let (mut dst_near, mut dst_far) = tokio::io::duplex(64);

        let writer = tokio::spawn(async move {
            // More than one buffer's worth, in dribs
            for i in 0u32..200 {
                src_far.write_all(&i.to_be_bytes()).await.unwrap();
            }
            src_far.shutdown().await.unwrap();
        });

        let reader = tokio::spawn(async move {
            let mut received = Vec::new();
            dst_far.read_to_end(&mut received).await.unwrap();
            received
        });

        let copied = pump(&mut src_near, &mut dst_near, &pool).await.unwrap();
        drop(dst_near);

        assert_eq!(copied, 800);
        let received = reader.await.unwrap();
        assert_eq!(received.len(), 800);
        for i in 0u32..200 {
            let at = (i as usize) * 4;
            assert_eq!(&received[at..at + 4], &i.to_be_bytes());
        }
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_relay_both_directions() {
        let pool = small_pool();
        let (client_near, mut client_far) = tokio::io::duplex(4096);
        let (backend_near, mut backend_far) = tokio::io::duplex(4096);

        let session = tokio::spawn(async move {
            run(client_near, backend_near, &pool, ConnId::new()).await;
        });

        client_far.write_all(b"ping").await.unwrap();
        let mut at_backend = [0u8; 4];
        backend_far.read_exact(&mut at_backend).await.unwrap();
        assert_eq!(&at_backend, b"ping");

        backend_far.write_all(b"pong").await.unwrap();
        let mut at_client = [0u8; 4];
        client_far.read_exact(&mut at_client).await.unwrap();
        assert_eq!(&at_client, b"pong");

        // Backend closing ends the session and the client sees EOF
        drop(backend_far);
        session.await.unwrap();
        let mut rest = Vec::new();
        client_far.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_relay_client_close_tears_down() {
        let pool = small_pool();
        let (client_near, client_far) = tokio::io::duplex(4096);
        let (backend_near, mut backend_far) = tokio::io::duplex(4096);

        let session = tokio::spawn(async move {
            run(client_near, backend_near, &pool, ConnId::new()).await;
        });

        drop(client_far);
        session.await.unwrap();

        let mut rest = Vec::new();
        backend_far.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_relay_large_transfer() {
        let pool = small_pool();
        let (client_near, mut client_far) = tokio::io::duplex(64 * 1024);
        let (backend_near, mut backend_far) = tokio::io::duplex(64 * 1024);

        let session = tokio::spawn(async move {
            run(client_near, backend_near, &pool, ConnId::new()).await;
        });

        // Echo at the backend side
        let echo = tokio::spawn(async move {
            let mut buf = vec![0u8; 8192];
            loop {
                let n = match backend_far.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                if backend_far.write_all(&buf[..n]).await.is_err() {
                    break;
                }
            }
        });

        // Write and read concurrently so backpressure can't deadlock the test
        let payload = vec![b'A'; 256 * 1024];
        let expected = payload.clone();
        let (mut client_rx, mut client_tx) = tokio::io::split(client_far);
        let push = tokio::spawn(async move {
            client_tx.write_all(&payload).await.unwrap();
            client_tx
        });
        let mut echoed = vec![0u8; expected.len()];
        client_rx.read_exact(&mut echoed).await.unwrap();
        assert_eq!(echoed, expected);

        drop(push.await.unwrap());
        drop(client_rx);
        session.await.unwrap();
        echo.await.unwrap();
    }
}
