//! Token codec: OpenSSL-compatible AES-256-CBC under the shared secret
//!
//! A token is `base64("Salted__" || salt8 || ciphertext)`. Key and IV are
//! derived from the secret and salt with the `EVP_BytesToKey` MD5 chain,
//! so tokens minted by `openssl enc -aes-256-cbc -base64 -pass pass:...`
//! (or any compatible client library) decrypt here unchanged. Blobs
//! without the salt header are accepted and derived with no salt.
//!
//! The plaintext must be a UTF-8 `host:port` address. Every failure mode
//! collapses to one "bad address" outcome at the handshake layer; the
//! variants below exist for logs and tests, not for the wire.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use md5::{Digest, Md5};
use thiserror::Error;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

/// OpenSSL salt header magic
const SALT_MAGIC: &[u8; 8] = b"Salted__";
/// Bytes of salt following the magic
const SALT_LEN: usize = 8;
/// Full salted header: magic + salt
const HEADER_LEN: usize = SALT_MAGIC.len() + SALT_LEN;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const BLOCK: usize = 16;

/// Token decode/decrypt failures
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("ciphertext is empty or not a whole number of blocks")]
    CipherLength,

    #[error("bad padding")]
    Padding,

    #[error("plaintext is not valid utf-8")]
    Utf8,

    #[error("plaintext is not a host:port address")]
    Address,

    #[error("plaintext does not fit the padding buffer")]
    Encrypt,
}

/// Derive an AES-256 key and CBC IV from the secret, OpenSSL
/// `EVP_BytesToKey` style: an MD5 chain over (previous digest || secret
/// || salt) until 48 bytes are produced.
fn bytes_to_key(secret: &[u8], salt: Option<&[u8]>) -> ([u8; KEY_LEN], [u8; IV_LEN]) {
    let mut derived = [0u8; KEY_LEN + IV_LEN];
    let mut previous: Vec<u8> = Vec::new();
    let mut filled = 0;

    while filled < derived.len() {
        let mut hasher = Md5::new();
        if !previous.is_empty() {
            hasher.update(&previous);
        }
        hasher.update(secret);
        if let Some(salt) = salt {
            hasher.update(salt);
        }
        let digest = hasher.finalize();

        let take = digest.len().min(derived.len() - filled);
        derived[filled..filled + take].copy_from_slice(&digest[..take]);
        filled += take;
        previous = digest.to_vec();
    }

    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    key.copy_from_slice(&derived[..KEY_LEN]);
    iv.copy_from_slice(&derived[KEY_LEN..]);
    (key, iv)
}

/// Decrypt a base64 token into the backend address it names.
pub fn decrypt_base64(secret: &[u8], token: &[u8]) -> Result<String, CodecError> {
    let blob = BASE64.decode(token)?;

    let (salt, body) = if blob.starts_with(SALT_MAGIC) {
        if blob.len() < HEADER_LEN {
            return Err(CodecError::CipherLength);
        }
        (Some(&blob[SALT_MAGIC.len()..HEADER_LEN]), &blob[HEADER_LEN..])
    } else {
        (None, &blob[..])
    };

    if body.is_empty() || body.len() % BLOCK != 0 {
        return Err(CodecError::CipherLength);
    }

    let (key, iv) = bytes_to_key(secret, salt);
    let mut data = body.to_vec();
    let plaintext = Aes256CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_mut::<Pkcs7>(&mut data)
        .map_err(|_| CodecError::Padding)?;

    let address = std::str::from_utf8(plaintext).map_err(|_| CodecError::Utf8)?;
    if !is_host_port(address) {
        return Err(CodecError::Address);
    }
    Ok(address.to_owned())
}

/// Encrypt an address (or any short payload) into the wire token form,
/// with a fresh random salt. Inverse of [`decrypt_base64`]; used by client
/// tooling and the test suite.
pub fn encrypt_base64(secret: &[u8], plaintext: &[u8]) -> Result<String, CodecError> {
    let salt: [u8; SALT_LEN] = rand::random();
    let (key, iv) = bytes_to_key(secret, Some(&salt));

    let padded_len = (plaintext.len() / BLOCK + 1) * BLOCK;
    let mut buf = vec![0u8; padded_len];
    buf[..plaintext.len()].copy_from_slice(plaintext);
    let ciphertext = Aes256CbcEnc::new(&key.into(), &iv.into())
        .encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext.len())
        .map_err(|_| CodecError::Encrypt)?;

    let mut blob = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    blob.extend_from_slice(SALT_MAGIC);
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(ciphertext);
    Ok(BASE64.encode(blob))
}

/// Minimal shape check for the decrypted address. IPv6 literals come
/// through bracketed (`[::1]:9000`), so splitting on the last colon works
/// for every form the dialer accepts.
fn is_host_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
