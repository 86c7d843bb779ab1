//! Per-connection handshake: token line, dial, status code
//!
//! The first bytes of an accepted stream are a base64 token terminated by
//! `\n`, naming the backend to dial. Reading the line may over-read into
//! the client's next message; that tail is preserved and forwarded to the
//! backend after the dial, never re-read from the client. The outcome is
//! reported with a single 3-byte status code, the first bytes the client
//! ever receives from us.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::codec::{self, CodecError};
use crate::constants::buffer::TOKEN_WINDOW;
use crate::constants::status;
use crate::types::DialRetry;

/// Why a handshake did not reach the relay stage
#[derive(Debug, Error)]
pub(crate) enum HandshakeError {
    #[error("no token line within {TOKEN_WINDOW} bytes")]
    TokenTooLong,

    #[error("client went away before the token line: {0}")]
    TokenRead(io::Error),

    #[error("token rejected: {0}")]
    BadToken(#[from] CodecError),

    #[error("dial {addr} failed: {source}")]
    Dial { addr: String, source: io::Error },

    #[error("dial {addr} timed out after {attempts} attempt(s)")]
    DialTimeout { addr: String, attempts: u32 },

    #[error("status write failed: {0}")]
    StatusWrite(io::Error),

    #[error("early payload forward failed: {0}")]
    RemainderWrite(io::Error),
}

impl HandshakeError {
    /// The code owed to the client, if any. Failures after the `200`
    /// went out get no second code: at most one status per connection.
    fn status(&self) -> Option<&'static [u8; 3]> {
        match self {
            Self::TokenTooLong | Self::TokenRead(_) => Some(status::BAD_REQUEST),
            Self::BadToken(_) => Some(status::BAD_ADDRESS),
            Self::Dial { .. } => Some(status::DIAL_FAILED),
            Self::DialTimeout { .. } => Some(status::DIAL_TIMEOUT),
            Self::StatusWrite(_) | Self::RemainderWrite(_) => None,
        }
    }
}

/// Run the handshake on a freshly accepted client stream.
///
/// On success the backend socket is open, the client has its `200`, and
/// any early payload has been forwarded. On failure the owed status code
/// has been written (best effort) and any half-opened backend is closed.
pub(crate) async fn establish<C>(
    client: &mut C,
    secret: &[u8],
    dial_retry: DialRetry,
    dial_timeout: Duration,
) -> Result<TcpStream, HandshakeError>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let result = run(client, secret, dial_retry, dial_timeout).await;
    if let Err(error) = &result {
        if let Some(code) = error.status() {
            // Best effort: the client may already be gone
            let _ = client.write_all(code).await;
        }
    }
    result
}

async fn run<C>(
    client: &mut C,
    secret: &[u8],
    dial_retry: DialRetry,
    dial_timeout: Duration,
) -> Result<TcpStream, HandshakeError>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let (token, remainder) = read_token_line(client).await?;
    let address = codec::decrypt_base64(secret, &token)?;
    let mut backend = dial(&address, dial_retry, dial_timeout).await?;

    // The 200 must land before any backend bytes can reach the client,
    // so it goes out before the relay stage exists at all.
    client
        .write_all(status::OK)
        .await
        .map_err(HandshakeError::StatusWrite)?;

    if !remainder.is_empty() {
        backend
            .write_all(&remainder)
            .await
            .map_err(HandshakeError::RemainderWrite)?;
    }

    Ok(backend)
}

/// Accumulate reads into the fixed token window until a `\n` shows up.
///
/// Returns the bytes strictly before the delimiter and, separately,
/// whatever was read past it. A window filled without a delimiter, a
/// read error, or EOF all mean the request is malformed.
async fn read_token_line<C>(client: &mut C) -> Result<(Vec<u8>, Vec<u8>), HandshakeError>
where
    C: AsyncRead + Unpin,
{
    let mut window = [0u8; TOKEN_WINDOW];
    let mut filled = 0;

    loop {
        let n = match client.read(&mut window[filled..]).await {
            Ok(0) => {
                return Err(HandshakeError::TokenRead(
                    io::ErrorKind::UnexpectedEof.into(),
                ))
            }
            Ok(n) => n,
            Err(error) => return Err(HandshakeError::TokenRead(error)),
        };

        if let Some(i) = window[filled..filled + n].iter().position(|&b| b == b'\n') {
            let line_end = filled + i;
            let token = window[..line_end].to_vec();
            let remainder = window[line_end + 1..filled + n].to_vec();
            return Ok((token, remainder));
        }

        filled += n;
        if filled == window.len() {
            return Err(HandshakeError::TokenTooLong);
        }
    }
}

/// Dial the decrypted address, retrying on timeout only.
///
/// A non-timeout error ends the loop immediately. The OS can report its
/// own connect timeout as an error before our deadline fires; both count
/// as timeout.
async fn dial(
    address: &str,
    retry: DialRetry,
    per_attempt: Duration,
) -> Result<TcpStream, HandshakeError> {
    let attempts = retry.get();

    for attempt in 1..=attempts {
        match timeout(per_attempt, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => return Ok(stream),
            Ok(Err(error)) if error.kind() == io::ErrorKind::TimedOut => {
                debug!(address, attempt, "dial attempt timed out");
            }
            Ok(Err(source)) => {
                return Err(HandshakeError::Dial {
                    addr: address.to_owned(),
                    source,
                });
            }
            Err(_elapsed) => {
                debug!(address, attempt, "dial attempt exceeded deadline");
            }
        }
    }

    Err(HandshakeError::DialTimeout {
        addr: address.to_owned(),
        attempts,
    })
}
