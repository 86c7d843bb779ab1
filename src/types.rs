//! Core validated types for the gateway
//!
//! NonZero-backed wrappers keep impossible configuration values out of the
//! type system entirely, and `ConnId` gives every accepted connection a
//! stable identity in the logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::{NonZeroU32, NonZeroUsize};
use thiserror::Error;
use uuid::Uuid;

use crate::constants::buffer;

/// Validation errors for gateway types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("secret cannot be empty")]
    EmptySecret,
}

/// Unique identifier for accepted connections, used as log context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(Uuid);

impl ConnId {
    /// Generate a new unique connection ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The shared decryption secret, loaded once at startup
///
/// Guaranteed non-empty. `Debug` never reveals the bytes; only the
/// length is printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
    /// Create a secret from raw bytes, rejecting empty input
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ValidationError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ValidationError::EmptySecret);
        }
        Ok(Self(bytes))
    }

    /// Key material for the token codec
    #[must_use]
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({} bytes)", self.0.len())
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s.into_bytes()).map_err(|_| serde::de::Error::custom("secret cannot be empty"))
    }
}

/// Generate a NonZero-backed config newtype.
///
/// Each type gets a validating `new`, a `get` accessor, `Display`,
/// conversion back into its primitive, and serde impls that reject zero
/// with the given message. Type-specific constants go in a separate
/// `impl` block next to the invocation.
macro_rules! nonzero_newtype {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident($nonzero:ty => $prim:ty) {
            zero_error: $zero_msg:literal,
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis struct $name($nonzero);

        impl $name {
            /// Construct from a raw value, rejecting 0
            #[must_use]
            $vis const fn new(value: $prim) -> Option<Self> {
                match <$nonzero>::new(value) {
                    Some(nz) => Some(Self(nz)),
                    None => None,
                }
            }

            /// The underlying value
            #[must_use]
            #[inline]
            $vis const fn get(&self) -> $prim {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.get())
            }
        }

        impl From<$name> for $prim {
            fn from(value: $name) -> Self {
                value.get()
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_u64(self.get() as u64)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let value = <$prim>::deserialize(deserializer)?;
                Self::new(value).ok_or_else(|| serde::de::Error::custom($zero_msg))
            }
        }
    };
}

nonzero_newtype! {
    /// A non-zero relay buffer size
    ///
    /// The configured floor ([`buffer::RELAY_FLOOR`]) is applied at
    /// config load, not here; this type only rules out zero.
    pub struct BufferSize(NonZeroUsize => usize) {
        zero_error: "buffer size cannot be 0",
    }
}

impl BufferSize {
    /// Default relay buffer size (8 KiB)
    pub const DEFAULT: Self = match Self::new(buffer::RELAY_DEFAULT) {
        Some(s) => s,
        None => unreachable!(),
    };
}

nonzero_newtype! {
    /// A non-zero dial attempt count
    ///
    /// The gateway always makes at least one attempt; a configured 0 is
    /// clamped to 1 at load with a warning.
    pub struct DialRetry(NonZeroU32 => u32) {
        zero_error: "dial retry cannot be 0",
    }
}

impl DialRetry {
    /// Single attempt, no retries
    pub const DEFAULT: Self = match Self::new(1) {
        Some(s) => s,
        None => unreachable!(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conn_id_unique() {
        assert_ne!(ConnId::new(), ConnId::new());
    }

    #[test]
    fn test_conn_id_display_is_uuid() {
        let id = ConnId::new();
        assert_eq!(format!("{}", id).len(), 36);
    }

    #[test]
    fn test_secret_rejects_empty() {
        assert_eq!(Secret::new(Vec::new()), Err(ValidationError::EmptySecret));
    }

    #[test]
    fn test_secret_roundtrip() {
        let secret = Secret::new(b"hunter2".to_vec()).unwrap();
        assert_eq!(secret.as_bytes(), b"hunter2");
    }

    #[test]
    fn test_secret_debug_redacts() {
        let secret = Secret::new(b"hunter2".to_vec()).unwrap();
        let rendered = format!("{:?}", secret);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("7 bytes"));
    }

    #[test]
    fn test_secret_deserialize() {
        let secret: Secret = serde_json::from_str(r#""hunter2""#).unwrap();
        assert_eq!(secret.as_bytes(), b"hunter2");

        let empty: Result<Secret, _> = serde_json::from_str(r#""""#);
        assert!(empty.is_err());
    }

    #[test]
    fn test_buffer_size_valid() {
        let size = BufferSize::new(8192).unwrap();
        assert_eq!(size.get(), 8192);
    }

    #[test]
    fn test_buffer_size_zero_rejected() {
        assert!(BufferSize::new(0).is_none());
    }

    #[test]
    fn test_buffer_size_default() {
        assert_eq!(BufferSize::DEFAULT.get(), 8 * 1024);
    }

    #[test]
    fn test_buffer_size_display_and_into() {
        let size = BufferSize::new(1024).unwrap();
        assert_eq!(format!("{}", size), "1024");
        assert_eq!(usize::from(size), 1024);
    }

    #[test]
    fn test_buffer_size_serde() {
        let size = BufferSize::new(4096).unwrap();
        let json = serde_json::to_string(&size).unwrap();
        assert_eq!(json, "4096");

        let deserialized: BufferSize = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, size);
    }

    #[test]
    fn test_buffer_size_serde_zero_rejected() {
        let result: Result<BufferSize, _> = serde_json::from_str("0");
        assert!(result.is_err());
    }

    #[test]
    fn test_dial_retry_valid() {
        let retry = DialRetry::new(3).unwrap();
        assert_eq!(retry.get(), 3);
    }

    #[test]
    fn test_dial_retry_zero_rejected() {
        assert!(DialRetry::new(0).is_none());
    }

    #[test]
    fn test_dial_retry_default() {
        assert_eq!(DialRetry::DEFAULT.get(), 1);
    }

    #[test]
    fn test_dial_retry_display_and_into() {
        let retry = DialRetry::new(2).unwrap();
        assert_eq!(format!("{}", retry), "2");
        assert_eq!(u32::from(retry), 2);
    }

    #[test]
    fn test_dial_retry_serde() {
        let retry = DialRetry::new(2).unwrap();
        let json = serde_json::to_string(&retry).unwrap();
        assert_eq!(json, "2");

        let deserialized: DialRetry = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, retry);
    }
}
